//! 事件转发（EventRelay）
//!
//! 把检测结果和训练数据组装成线路消息交给 [`DeviceLink`]。
//! 训练状态消息同时成为连接的状态快照。

use crate::error::LinkError;
use crate::link::{DeviceLink, Delivery};
use punch_detect::{Detection, PunchStatistics};
use punch_protocol::{WireMessage, WorkoutStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 事件转发器
#[derive(Clone)]
pub struct EventRelay {
    link: Arc<DeviceLink>,
}

impl EventRelay {
    pub fn new(link: Arc<DeviceLink>) -> Self {
        Self { link }
    }

    pub fn link(&self) -> &Arc<DeviceLink> {
        &self.link
    }

    /// 转发一次出拳：`speed` 取事件强度，`isMax` 取去抖器的判断
    pub fn relay_punch(&self, detection: &Detection) -> Result<Delivery, LinkError> {
        let event = &detection.event;
        let message = WireMessage::punch(
            event.magnitude,
            detection.acceptance.is_max,
            event.timestamp,
        );
        let delivery = self.link.send(&message)?;
        debug!(
            "Relayed {:?} punch #{} ({:?})",
            event.source, detection.acceptance.count, delivery
        );
        Ok(delivery)
    }

    /// 转发出拳统计
    pub fn relay_stats(
        &self,
        statistics: &PunchStatistics,
        at: Duration,
    ) -> Result<Delivery, LinkError> {
        self.link
            .send(&WireMessage::stats(statistics.max, statistics.average, at))
    }

    /// 转发训练状态，并设为状态快照
    pub fn relay_workout(
        &self,
        status: WorkoutStatus,
        at: Duration,
    ) -> Result<Delivery, LinkError> {
        let message = WireMessage::workout(status, at);
        self.link.set_status_snapshot(&message)?;
        self.link.send(&message)
    }

    /// 转发健康数据
    ///
    /// # 错误
    ///
    /// 两项指标都缺失时返回 `LinkError::Protocol`。
    pub fn relay_health(
        &self,
        heart_rate: Option<f64>,
        calories: Option<f64>,
        at: Duration,
    ) -> Result<Delivery, LinkError> {
        let message = WireMessage::health(heart_rate, calories, at)?;
        self.link.send(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DemoteReason, LinkConfig};
    use crate::scheduler::ManualScheduler;
    use crate::transport::{ChannelTransport, TransportCommand};
    use crossbeam_channel::Receiver;
    use punch_detect::{Acceptance, PunchEvent, PunchSource, Side};
    use punch_protocol::{DeliveryChannel, ProtocolError};

    fn relay() -> (EventRelay, Receiver<TransportCommand>) {
        let (transport, rx) = ChannelTransport::new(16);
        transport.set_reachable(true);
        let scheduler = Arc::new(ManualScheduler::new());
        let link = DeviceLink::new(
            LinkConfig::default(),
            Arc::new(transport),
            scheduler.clone(),
            scheduler,
        );
        link.activate();
        link.on_activation_result(true);
        // 丢弃激活命令
        let _ = rx.try_recv();
        (EventRelay::new(link), rx)
    }

    fn detection(speed: f64, is_max: bool) -> Detection {
        Detection {
            event: PunchEvent {
                source: PunchSource::Motion,
                side: Side::Unknown,
                magnitude: speed,
                timestamp: Duration::from_secs(1000),
            },
            acceptance: Acceptance {
                count: 1,
                is_max,
                statistics: PunchStatistics {
                    count: 1,
                    max: speed,
                    average: speed,
                },
            },
        }
    }

    fn next_payload(rx: &Receiver<TransportCommand>) -> (DeliveryChannel, serde_json::Value) {
        match rx.try_recv().unwrap() {
            TransportCommand::Send { channel, message } => {
                (channel, serde_json::Value::Object(message.payload))
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_relay_punch() {
        let (relay, rx) = relay();
        assert_eq!(
            relay.relay_punch(&detection(4.5, true)).unwrap(),
            Delivery::Transient
        );
        let (channel, payload) = next_payload(&rx);
        assert_eq!(channel, DeliveryChannel::Transient);
        assert_eq!(
            payload,
            serde_json::json!({
                "type": "punchData",
                "speed": 4.5,
                "isMax": true,
                "timestamp": 1000.0,
            })
        );
    }

    #[test]
    fn test_relay_workout_sets_snapshot() {
        let (relay, _rx) = relay();
        relay
            .relay_workout(WorkoutStatus::Started, Duration::from_secs(1))
            .unwrap();
        let snapshot = relay.link().status_snapshot().unwrap();
        assert_eq!(snapshot["type"], "workoutStatus");
        assert_eq!(snapshot["status"], "started");
    }

    #[test]
    fn test_relay_stats_rate_limited() {
        let (relay, rx) = relay();
        relay.relay_punch(&detection(10.0, true)).unwrap();
        let stats = PunchStatistics {
            count: 3,
            max: 30.0,
            average: 20.0,
        };
        assert_eq!(
            relay.relay_stats(&stats, Duration::from_secs(2)).unwrap(),
            Delivery::Durable(DemoteReason::RateLimited)
        );
        let _ = next_payload(&rx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_relay_health_requires_metric() {
        let (relay, _rx) = relay();
        assert!(matches!(
            relay.relay_health(None, None, Duration::from_secs(1)),
            Err(LinkError::Protocol(ProtocolError::EmptyHealthData))
        ));
        assert!(
            relay
                .relay_health(Some(120.0), None, Duration::from_secs(1))
                .is_ok()
        );
    }
}
