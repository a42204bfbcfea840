//! 键值表编解码
//!
//! 平台连接层传递的是 `Map<String, Value>`（字典）。字节型传输可以使用
//! `encode_json` / `decode_json`。

use serde_json::{Map, Value};

use crate::ProtocolError;
use crate::message::{MessageKind, WireMessage};

/// 编码后的消息负载（键值表）
pub type Payload = Map<String, Value>;

/// 编码为键值表
pub fn encode(message: &WireMessage) -> Result<Payload, ProtocolError> {
    message.validate()?;
    match serde_json::to_value(message)? {
        Value::Object(map) => Ok(map),
        // 内部标签枚举总是序列化为对象
        other => Err(ProtocolError::NotAnObject {
            found: value_kind(&other),
        }),
    }
}

/// 从键值表解码
///
/// 先检查 `type` 字段，以便对未知类型给出明确错误。
pub fn decode(payload: &Payload) -> Result<WireMessage, ProtocolError> {
    let tag = payload
        .get("type")
        .ok_or(ProtocolError::MissingType)?
        .as_str()
        .ok_or(ProtocolError::MissingType)?;

    if MessageKind::from_type_tag(tag).is_none() {
        return Err(ProtocolError::UnknownType(tag.to_string()));
    }

    let message: WireMessage = serde_json::from_value(Value::Object(payload.clone()))?;
    message.validate()?;
    Ok(message)
}

/// 编码为 JSON 字节
pub fn encode_json(message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode(message)?;
    Ok(serde_json::to_vec(&payload)?)
}

/// 从 JSON 字节解码
pub fn decode_json(bytes: &[u8]) -> Result<WireMessage, ProtocolError> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => decode(&map),
        other => Err(ProtocolError::NotAnObject {
            found: value_kind(&other),
        }),
    }
}

/// 仅读取负载的消息种类（不做完整解码）
pub fn peek_kind(payload: &Payload) -> Option<MessageKind> {
    payload
        .get("type")
        .and_then(Value::as_str)
        .and_then(MessageKind::from_type_tag)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
