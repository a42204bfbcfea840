//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use punch_sdk::prelude::*;
//! ```

// 会话层
pub use crate::config::PunchConfig;
pub use crate::session::{FrameOutcome, SessionObserver, TrainingSession};

// 检测层
pub use punch_detect::{
    Detection, JointId, MotionClassifier, MotionClassifierConfig, MotionSample, PoseClassifier,
    PoseClassifierConfig, PoseFrame, PunchEvent, PunchSource, PunchStatistics, Side,
};

// 连接层
pub use punch_link::{
    ChannelTransport, Delivery, DeviceLink, DeviceLinkState, EventRelay, LinkConfig,
    LinkObserver, ManualScheduler, ThreadScheduler, Transport,
};

// 协议层
pub use punch_protocol::{DeliveryChannel, MessageKind, WireMessage, WorkoutStatus};

// 错误类型
pub use crate::error::SdkError;
pub use punch_detect::DetectError;
pub use punch_link::LinkError;
pub use punch_protocol::ProtocolError;
