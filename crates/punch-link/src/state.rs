//! 连接状态与状态转换
//!
//! `transition` 是纯函数，只回答"在状态 X 收到事件 Y 之后应该进入哪个状态"。
//! 副作用（激活、补发、重试定时器）由 [`DeviceLink`](crate::DeviceLink) 负责。
//!
//! ```text
//! Disconnected --activate / reconnect_timer--> Activating
//! Activating   --ack(ok)-->                    Connected
//! Activating   --ack(fail)-->                  Disconnected
//! Connected    --reachability_lost-->          Degraded
//! Degraded     --reachability_restored-->      Connected
//! Connected|Degraded --session_invalidated-->  Disconnected
//! *            --teardown-->                   Disconnected
//! ```

use std::fmt;

/// 设备连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceLinkState {
    /// 未连接（初始状态）
    #[default]
    Disconnected = 0,
    /// 正在激活会话
    Activating = 1,
    /// 已连接且对端可达
    Connected = 2,
    /// 已连接但对端暂不可达（只能走 Durable 通道）
    Degraded = 3,
}

impl DeviceLinkState {
    /// 是否有活动会话（Connected 或 Degraded）
    pub fn is_session_active(self) -> bool {
        matches!(self, Self::Connected | Self::Degraded)
    }

    /// 是否可以走 Transient 通道
    pub fn is_reachable(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for DeviceLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Activating => "activating",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// 状态机输入事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// 调用方显式激活
    Activate,
    /// 平台返回激活结果
    ActivationAck { success: bool },
    /// 对端变为不可达
    ReachabilityLost,
    /// 对端恢复可达
    ReachabilityRestored,
    /// 平台使会话失效（如对端 App 进入后台）
    SessionInvalidated,
    /// 重连定时器到期（`generation` 用于识别过期定时器）
    ReconnectTimer { generation: u64 },
    /// 显式拆除
    Teardown,
}

/// 状态转换函数
///
/// 返回 `None` 表示该事件在当前状态下无效（调用方按空操作处理）。
pub fn transition(state: DeviceLinkState, event: LinkEvent) -> Option<DeviceLinkState> {
    use DeviceLinkState::*;
    use LinkEvent::*;

    match (state, event) {
        (_, Teardown) => Some(Disconnected),
        (Disconnected, Activate | ReconnectTimer { .. }) => Some(Activating),
        (Activating, ActivationAck { success: true }) => Some(Connected),
        (Activating, ActivationAck { success: false }) => Some(Disconnected),
        (Connected, ReachabilityLost) => Some(Degraded),
        (Degraded, ReachabilityRestored) => Some(Connected),
        (Connected | Degraded, SessionInvalidated) => Some(Disconnected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeviceLinkState::*;

    #[test]
    fn test_happy_path() {
        let s = transition(Disconnected, LinkEvent::Activate).unwrap();
        assert_eq!(s, Activating);
        let s = transition(s, LinkEvent::ActivationAck { success: true }).unwrap();
        assert_eq!(s, Connected);
        let s = transition(s, LinkEvent::ReachabilityLost).unwrap();
        assert_eq!(s, Degraded);
        let s = transition(s, LinkEvent::ReachabilityRestored).unwrap();
        assert_eq!(s, Connected);
    }

    #[test]
    fn test_activation_failure_returns_to_disconnected() {
        assert_eq!(
            transition(Activating, LinkEvent::ActivationAck { success: false }),
            Some(Disconnected)
        );
    }

    #[test]
    fn test_session_invalidation() {
        assert_eq!(
            transition(Connected, LinkEvent::SessionInvalidated),
            Some(Disconnected)
        );
        assert_eq!(
            transition(Degraded, LinkEvent::SessionInvalidated),
            Some(Disconnected)
        );
        assert_eq!(transition(Activating, LinkEvent::SessionInvalidated), None);
    }

    #[test]
    fn test_invalid_events_are_rejected() {
        assert_eq!(transition(Connected, LinkEvent::Activate), None);
        assert_eq!(
            transition(Connected, LinkEvent::ActivationAck { success: true }),
            None
        );
        assert_eq!(transition(Disconnected, LinkEvent::ReachabilityRestored), None);
        assert_eq!(transition(Degraded, LinkEvent::ReachabilityLost), None);
        assert_eq!(
            transition(Activating, LinkEvent::ReconnectTimer { generation: 0 }),
            None
        );
    }

    #[test]
    fn test_teardown_from_any_state() {
        for state in [Disconnected, Activating, Connected, Degraded] {
            assert_eq!(transition(state, LinkEvent::Teardown), Some(Disconnected));
        }
    }
}
