//! # Punch Link
//!
//! 手持设备与可穿戴设备之间的连接层
//!
//! ## 模块
//!
//! - `state`: 连接状态与纯状态转换函数
//! - `link`: `DeviceLink`（状态机 + 投递策略 + 退避重连）
//! - `durable`: 按种类保存最新值的待补发队列
//! - `rate_limit`: 即时投递限流
//! - `scheduler` / `clock`: 可注入的定时器与时间源
//! - `transport`: 平台传输抽象与 Channel 实现
//! - `hooks`: 连接观察者
//! - `relay`: 检测结果 → 线路消息
//!
//! ## 平台集成
//!
//! 集成方实现 [`Transport`]，并把平台回调转发给
//! [`DeviceLink::on_activation_result`]、[`DeviceLink::on_reachability_changed`]、
//! [`DeviceLink::session_invalidated`] 和 [`DeviceLink::on_delivery_failed`]。

pub mod clock;
pub mod durable;
mod error;
pub mod hooks;
pub mod link;
pub mod rate_limit;
pub mod relay;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use clock::{Clock, MonotonicClock};
pub use error::{LinkError, TransportError};
pub use hooks::{LinkObserver, ObserverList};
pub use link::{Delivery, DemoteReason, DeviceLink, DeviceLinkBuilder, LinkConfig, LinkStats};
pub use relay::EventRelay;
pub use scheduler::{ManualScheduler, Scheduler, ThreadScheduler, TimerId};
pub use state::{DeviceLinkState, LinkEvent};
pub use transport::{ChannelTransport, OutboundMessage, Transport};
