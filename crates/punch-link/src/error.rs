//! 连接层错误类型定义

use punch_protocol::ProtocolError;
use thiserror::Error;

/// 传输层错误
///
/// 由 [`Transport`](crate::Transport) 实现返回。连接层把它们视为
/// "本次即时投递失败"，消息会降级为 Durable，不会向上抛出。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 对端不可达
    #[error("Peer unreachable")]
    Unreachable,

    /// 传输队列已满
    #[error("Transport queue full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// 传输已关闭（平台侧接收端退出）
    #[error("Transport closed")]
    Closed,

    /// 平台拒绝了本次投递
    #[error("Transport rejected message: {0}")]
    Rejected(String),
}

/// 连接层错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 消息编码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 传输错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 配置无效
    #[error("Invalid link config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// 定时器线程启动失败
    #[error("Failed to start timer thread: {0}")]
    TimerThread(#[from] std::io::Error),
}
