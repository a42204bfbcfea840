//! # Punch Protocol
//!
//! 手持设备与可穿戴设备之间的消息协议（无平台依赖）
//!
//! ## 模块
//!
//! - `message`: 线路消息与消息种类
//! - `codec`: 键值表 / JSON 编解码
//!
//! ## 投递通道
//!
//! 连接层区分两种投递方式：
//! - **Transient**: 对端可达时立即发送，尽力而为，至多一次
//! - **Durable**: 按消息种类保存的"最新值"快照，重新连通后再投递

pub mod codec;
pub mod message;

pub use codec::{Payload, decode, decode_json, encode, encode_json, peek_kind};
pub use message::{MessageKind, WireMessage, WorkoutStatus};

use thiserror::Error;

/// 投递通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryChannel {
    /// 即时投递（仅在对端可达时有效）
    Transient,
    /// 最新值快照（重新连通后投递）
    Durable,
}

/// 协议编解码错误
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 负载缺少 `type` 字段或其不是字符串
    #[error("Missing or non-string `type` field")]
    MissingType,

    /// 未知的消息类型
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// 负载不是键值表
    #[error("Payload is not an object (found {found})")]
    NotAnObject { found: &'static str },

    /// 健康数据两项指标都缺失
    #[error("healthData requires heartRate and/or calories")]
    EmptyHealthData,

    /// 浮点字段为 NaN 或无穷
    #[error("Field `{field}` is not a finite number")]
    NonFinite { field: &'static str },

    /// JSON 解析 / 字段错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
