//! Punch SDK - 拳击训练伴侣核心
//!
//! 从传感器输入识别出拳，并把结果可靠地同步到配对的可穿戴设备。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 线路消息与编解码
//! - **检测层** (`detect`): 姿态几何分类器、加速度阈值分类器、去抖
//! - **连接层** (`link`): 连接状态机、Durable 补发、退避重连、事件转发
//! - **会话层** (`session`): 把以上各层串成一次训练
//!
//! # 快速开始
//!
//! ```rust
//! use punch_sdk::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let (transport, _rx) = ChannelTransport::new(64);
//! let scheduler = Arc::new(ManualScheduler::new());
//! let link = DeviceLink::new(
//!     LinkConfig::default(),
//!     Arc::new(transport),
//!     scheduler.clone(),
//!     scheduler,
//! );
//!
//! let session = TrainingSession::new(&PunchConfig::default(), Some(EventRelay::new(link))).unwrap();
//! let sample = MotionSample::new(Duration::from_millis(0), 4.2, 0.0, 0.0);
//! assert!(session.submit_motion(&sample).detection().is_some());
//! ```

pub mod config;
mod error;
pub mod logging;
pub mod prelude;
pub mod session;

pub use punch_detect as detect;
pub use punch_link as link;
pub use punch_protocol as protocol;

pub use config::PunchConfig;
pub use error::SdkError;
pub use session::{
    ChannelSessionObserver, FrameOutcome, SessionNotification, SessionObserver, SessionStats,
    TrainingSession,
};

// 各层错误类型
pub use punch_detect::DetectError;
pub use punch_link::LinkError;
pub use punch_protocol::ProtocolError;
