//! 传输抽象（Transport）
//!
//! 连接层只依赖三个平台原语：激活会话、查询可达性、按通道投递负载。
//! 平台的异步回调（激活结果、可达性变化、投递失败）由集成方转发给
//! [`DeviceLink`](crate::DeviceLink) 的对应方法。
//!
//! # 设计原则
//!
//! - **非阻塞**: `send` / `activate` 不得做同步 I/O
//! - **有界队列**: [`ChannelTransport`] 使用 `bounded` + `try_send`，队列满即失败
//!
//! # 使用示例
//!
//! ```rust
//! use punch_link::transport::{ChannelTransport, Transport, TransportCommand};
//!
//! let (transport, rx) = ChannelTransport::new(64);
//! transport.set_reachable(true);
//!
//! // 平台线程消费命令
//! std::thread::spawn(move || {
//!     while let Ok(command) = rx.recv() {
//!         match command {
//!             TransportCommand::Activate => { /* 激活会话 */ }
//!             TransportCommand::Send { channel, message } => { /* 投递 */ }
//!         }
//!     }
//! });
//! ```

use crate::error::TransportError;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use punch_protocol::{DeliveryChannel, MessageKind, Payload, ProtocolError, WireMessage, encode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// 已编码、待投递的消息
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// 连接内单调递增的序号（入队顺序）
    pub sequence: u64,
    pub kind: MessageKind,
    pub payload: Payload,
    /// 进入连接层的时间
    pub enqueued_at: Duration,
}

impl OutboundMessage {
    /// 编码线路消息
    ///
    /// # 错误
    ///
    /// 消息字段不合法（非有限值、空健康数据）时返回 `ProtocolError`。
    pub fn new(
        sequence: u64,
        message: &WireMessage,
        enqueued_at: Duration,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            sequence,
            kind: message.kind(),
            payload: encode(message)?,
            enqueued_at,
        })
    }
}

/// 平台传输接口
///
/// 实现必须是非阻塞的：调用方可能持有其它锁，也可能在传感器回调中。
pub trait Transport: Send + Sync {
    /// 请求激活会话
    ///
    /// 返回 `Ok` 只表示请求已提交，结果通过
    /// [`DeviceLink::on_activation_result`](crate::DeviceLink::on_activation_result) 回报。
    fn activate(&self) -> Result<(), TransportError>;

    /// 对端当前是否可达
    fn is_reachable(&self) -> bool;

    /// 按通道投递一条消息
    fn send(&self, message: &OutboundMessage, channel: DeliveryChannel)
    -> Result<(), TransportError>;
}

/// 发往平台线程的命令
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Activate,
    Send {
        channel: DeliveryChannel,
        message: OutboundMessage,
    },
}

/// 基于有界 Channel 的传输
///
/// 把命令转发给平台线程处理；可达性由平台线程通过 [`set_reachable`](Self::set_reachable) 更新。
pub struct ChannelTransport {
    tx: Sender<TransportCommand>,
    capacity: usize,
    reachable: Arc<AtomicBool>,
    /// 因队列满被拒绝的命令数
    rejected: Arc<AtomicU64>,
}

impl ChannelTransport {
    /// 创建传输及其命令接收端
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<TransportCommand>) {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        let transport = Self {
            tx,
            capacity,
            reachable: Arc::new(AtomicBool::new(false)),
            rejected: Arc::new(AtomicU64::new(0)),
        };
        (transport, rx)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// 可达性标志（供平台线程持有）
    pub fn reachability(&self) -> &Arc<AtomicBool> {
        &self.reachable
    }

    /// 队列满被拒绝的命令计数
    pub fn rejected(&self) -> &Arc<AtomicU64> {
        &self.rejected
    }

    fn push(&self, command: TransportCommand) -> Result<(), TransportError> {
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(TransportError::QueueFull {
                    capacity: self.capacity,
                })
            },
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Closed),
        }
    }
}

impl Transport for ChannelTransport {
    fn activate(&self) -> Result<(), TransportError> {
        self.push(TransportCommand::Activate)
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    fn send(
        &self,
        message: &OutboundMessage,
        channel: DeliveryChannel,
    ) -> Result<(), TransportError> {
        if channel == DeliveryChannel::Transient && !self.is_reachable() {
            return Err(TransportError::Unreachable);
        }
        self.push(TransportCommand::Send {
            channel,
            message: message.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound() -> OutboundMessage {
        let wire = WireMessage::punch(4.5, true, Duration::from_secs(1000));
        OutboundMessage::new(1, &wire, Duration::ZERO).unwrap()
    }

    #[test]
    fn test_outbound_message_encodes_payload() {
        let message = outbound();
        assert_eq!(message.kind, MessageKind::PunchData);
        assert_eq!(message.payload["type"], "punchData");
        assert_eq!(message.payload["speed"], 4.5);
    }

    #[test]
    fn test_outbound_message_rejects_invalid() {
        let wire = WireMessage::punch(f64::NAN, false, Duration::ZERO);
        assert!(OutboundMessage::new(1, &wire, Duration::ZERO).is_err());
    }

    #[test]
    fn test_transient_requires_reachability() {
        let (transport, rx) = ChannelTransport::new(4);
        assert_eq!(
            transport.send(&outbound(), DeliveryChannel::Transient),
            Err(TransportError::Unreachable)
        );
        // Durable 不要求可达
        transport.send(&outbound(), DeliveryChannel::Durable).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            TransportCommand::Send {
                channel: DeliveryChannel::Durable,
                ..
            }
        ));
    }

    #[test]
    fn test_queue_full_is_reported() {
        let (transport, _rx) = ChannelTransport::new(1);
        transport.set_reachable(true);
        transport.activate().unwrap();
        assert_eq!(
            transport.send(&outbound(), DeliveryChannel::Transient),
            Err(TransportError::QueueFull { capacity: 1 })
        );
        assert_eq!(transport.rejected().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_closed_receiver() {
        let (transport, rx) = ChannelTransport::new(4);
        drop(rx);
        assert_eq!(transport.activate(), Err(TransportError::Closed));
    }
}
