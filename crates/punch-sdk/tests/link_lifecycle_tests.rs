//! 连接生命周期集成测试
//!
//! 使用记录型传输 + `ManualScheduler`（虚拟时间）验证：
//! - Disconnected → Activating → Connected → Degraded → Connected 的补发顺序
//! - 激活失败的退避序列与放弃通知
//!
//! 最后一个测试使用真实的 `ThreadScheduler`，验证后台定时器线程能驱动重连。

use parking_lot::Mutex;
use punch_sdk::link::{
    ChannelTransport, DeviceLink, DeviceLinkState, LinkConfig, LinkObserver, ManualScheduler,
    OutboundMessage, ThreadScheduler, Transport, TransportError,
    transport::TransportCommand,
};
use punch_sdk::protocol::{DeliveryChannel, MessageKind, WireMessage, WorkoutStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 记录所有投递的传输
#[derive(Default)]
struct RecordingTransport {
    activations: AtomicUsize,
    sent: Mutex<Vec<(DeliveryChannel, OutboundMessage)>>,
}

impl RecordingTransport {
    fn sent(&self, channel: DeliveryChannel) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn activate(&self) -> Result<(), TransportError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        true
    }

    fn send(
        &self,
        message: &OutboundMessage,
        channel: DeliveryChannel,
    ) -> Result<(), TransportError> {
        self.sent.lock().push((channel, message.clone()));
        Ok(())
    }
}

/// 记录状态变化与放弃通知
#[derive(Default)]
struct StateRecorder {
    states: Mutex<Vec<DeviceLinkState>>,
    exhausted: Mutex<Vec<u32>>,
}

impl LinkObserver for StateRecorder {
    fn on_link_state_changed(&self, state: DeviceLinkState) {
        self.states.lock().push(state);
    }

    fn on_reconnect_exhausted(&self, attempts: u32) {
        self.exhausted.lock().push(attempts);
    }
}

struct Harness {
    link: Arc<DeviceLink>,
    transport: Arc<RecordingTransport>,
    scheduler: Arc<ManualScheduler>,
    recorder: Arc<StateRecorder>,
}

fn harness() -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let scheduler = Arc::new(ManualScheduler::new());
    let recorder = Arc::new(StateRecorder::default());
    let link = DeviceLink::builder(transport.clone())
        .scheduler(scheduler.clone())
        .clock(scheduler.clone())
        .observer(recorder.clone())
        .build()
        .expect("link should build with valid config");
    Harness {
        link,
        transport,
        scheduler,
        recorder,
    }
}

#[test]
fn test_lifecycle_flushes_durable_in_order_exactly_once() {
    let h = harness();

    h.link.activate();
    h.link.on_activation_result(true);
    h.link.on_reachability_changed(false);
    assert_eq!(h.link.state(), DeviceLinkState::Degraded);

    let t = Duration::from_secs;
    h.link.send(&WireMessage::punch(12.0, true, t(10))).unwrap();
    h.link.send(&WireMessage::stats(12.0, 12.0, t(11))).unwrap();
    h.link
        .send(&WireMessage::workout(WorkoutStatus::Ended, t(12)))
        .unwrap();
    h.link.send(&WireMessage::punch(8.0, false, t(13))).unwrap();
    assert_eq!(
        h.link.pending_durable(),
        vec![
            MessageKind::PunchStats,
            MessageKind::WorkoutStatus,
            MessageKind::PunchData
        ]
    );

    h.link.on_reachability_changed(true);
    assert_eq!(h.link.state(), DeviceLinkState::Connected);

    let flushed = h.transport.sent(DeliveryChannel::Durable);
    let kinds: Vec<_> = flushed.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::PunchStats,
            MessageKind::WorkoutStatus,
            MessageKind::PunchData
        ]
    );
    // latest wins
    assert_eq!(flushed[2].payload["speed"], 8.0);
    assert!(h.transport.sent(DeliveryChannel::Transient).is_empty());

    h.link.on_reachability_changed(false);
    h.link.on_reachability_changed(true);
    assert_eq!(h.transport.sent(DeliveryChannel::Durable).len(), 3);

    assert_eq!(
        *h.recorder.states.lock(),
        vec![
            DeviceLinkState::Activating,
            DeviceLinkState::Connected,
            DeviceLinkState::Degraded,
            DeviceLinkState::Connected,
            DeviceLinkState::Degraded,
            DeviceLinkState::Connected,
        ]
    );
}

#[test]
fn test_backoff_delays_then_give_up() {
    let h = harness();

    h.link.activate();
    h.link.on_activation_result(false);
    h.scheduler.advance(Duration::from_secs(2));
    h.link.on_activation_result(false);
    h.scheduler.advance(Duration::from_secs(4));
    h.link.on_activation_result(false);
    h.scheduler.advance(Duration::from_secs(6));
    assert_eq!(h.link.state(), DeviceLinkState::Activating);
    h.link.on_activation_result(false);

    assert_eq!(
        h.scheduler.scheduled_delays(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6)
        ]
    );
    assert_eq!(h.link.state(), DeviceLinkState::Disconnected);
    assert_eq!(h.scheduler.pending_count(), 0);
    assert_eq!(*h.recorder.exhausted.lock(), vec![3]);

    // 放弃后不再自动重试
    assert_eq!(h.scheduler.advance(Duration::from_secs(60)), 0);
    assert_eq!(h.transport.activations.load(Ordering::SeqCst), 4);

    // 显式激活开始新的周期
    assert!(h.link.activate());
    h.link.on_activation_result(false);
    assert_eq!(
        h.scheduler.scheduled_delays().last(),
        Some(&Duration::from_secs(2))
    );
}

#[test]
fn test_snapshot_resent_after_restore() {
    let h = harness();
    h.link.activate();
    h.link.on_activation_result(true);

    let started = WireMessage::workout(WorkoutStatus::Started, Duration::from_secs(1));
    h.link.set_status_snapshot(&started).unwrap();
    h.link.send(&started).unwrap();

    h.link.on_reachability_changed(false);
    // 快照重发占用即时投递配额，需等过限流间隔
    h.scheduler.advance(Duration::from_millis(500));
    h.link.on_reachability_changed(true);

    let transient = h.transport.sent(DeliveryChannel::Transient);
    assert_eq!(transient.len(), 2);
    assert!(
        transient
            .iter()
            .all(|m| m.kind == MessageKind::WorkoutStatus)
    );
}

#[test]
fn test_thread_scheduler_drives_reconnect() {
    let (transport, rx) = ChannelTransport::new(16);
    transport.set_reachable(true);
    let scheduler = Arc::new(ThreadScheduler::new().expect("timer thread"));
    let link = DeviceLink::builder(Arc::new(transport))
        .config(LinkConfig {
            backoff_step_ms: 10,
            ..Default::default()
        })
        .scheduler(scheduler)
        .build()
        .unwrap();

    link.activate();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(1)).unwrap(),
        TransportCommand::Activate
    );
    link.on_activation_result(false);

    // 第一次重试在 10ms 后由定时器线程发起
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        TransportCommand::Activate
    );
    assert_eq!(link.state(), DeviceLinkState::Activating);
    link.on_activation_result(true);
    assert_eq!(link.state(), DeviceLinkState::Connected);
}
