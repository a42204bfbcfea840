//! DeviceLink 并发测试
//!
//! 多个线程同时驱动同一个连接（可达性变化、投递、会话失效与重新激活），验证：
//! - 观察者看到的状态序列是 `transition` 上的合法路径
//! - 每条消息最多被投递一次（Durable 不重复补发，也不与即时投递重复）

use parking_lot::Mutex;
use punch_sdk::link::state::transition;
use punch_sdk::link::{
    DeviceLink, DeviceLinkState, LinkConfig, LinkEvent, LinkObserver, ManualScheduler,
    OutboundMessage, Transport, TransportError,
};
use punch_sdk::protocol::{DeliveryChannel, WireMessage};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(DeliveryChannel, u64)>>,
}

impl Transport for RecordingTransport {
    fn activate(&self) -> Result<(), TransportError> {
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
        self.sent.lock().push((channel, message.sequence));
        thread::yield_now();
        Ok(())
    }
}

#[derive(Default)]
struct StateRecorder {
    states: Mutex<Vec<DeviceLinkState>>,
}

impl LinkObserver for StateRecorder {
    fn on_link_state_changed(&self, state: DeviceLinkState) {
        self.states.lock().push(state);
    }
}

const ALL_EVENTS: [LinkEvent; 8] = [
    LinkEvent::Activate,
    LinkEvent::ActivationAck { success: true },
    LinkEvent::ActivationAck { success: false },
    LinkEvent::ReachabilityLost,
    LinkEvent::ReachabilityRestored,
    LinkEvent::SessionInvalidated,
    LinkEvent::ReconnectTimer { generation: 0 },
    LinkEvent::Teardown,
];

fn is_single_step(from: DeviceLinkState, to: DeviceLinkState) -> bool {
    from != to && ALL_EVENTS.iter().any(|&e| transition(from, e) == Some(to))
}

#[test]
fn test_concurrent_events_keep_valid_state_path() {
    let transport = Arc::new(RecordingTransport::default());
    let recorder = Arc::new(StateRecorder::default());
    let link = DeviceLink::builder(transport.clone())
        .config(LinkConfig {
            transient_min_interval_ms: 1,
            ..Default::default()
        })
        .scheduler(Arc::new(ManualScheduler::new()))
        .observer(recorder.clone())
        .build()
        .unwrap();

    link.activate();
    link.on_activation_result(true);

    let iterations = 200;
    let mut handles = Vec::new();

    // 可达性抖动
    let l = link.clone();
    handles.push(thread::spawn(move || {
        for _ in 0..iterations {
            l.on_reachability_changed(false);
            thread::yield_now();
            l.on_reachability_changed(true);
        }
    }));

    // 会话失效后重新激活
    let l = link.clone();
    handles.push(thread::spawn(move || {
        for _ in 0..iterations {
            l.session_invalidated();
            thread::yield_now();
            l.activate();
            l.on_activation_result(true);
        }
    }));

    // 两个投递线程
    for worker in 0..2u64 {
        let l = link.clone();
        handles.push(thread::spawn(move || {
            for i in 0..iterations {
                let t = Duration::from_millis(worker * 10_000 + i);
                l.send(&WireMessage::punch(3.0 + i as f64, false, t)).unwrap();
                l.send(&WireMessage::stats(9.0, 4.0, t)).unwrap();
                if i % 16 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // 收尾：重新建立会话，补发限流或断连期间积压的消息
    if link.state() != DeviceLinkState::Activating {
        link.session_invalidated();
        assert!(link.activate());
    }
    assert!(link.on_activation_result(true));
    assert_eq!(link.state(), DeviceLinkState::Connected);
    assert!(link.pending_durable().is_empty());

    let states = recorder.states.lock().clone();
    assert!(states.len() > 2);
    let mut previous = DeviceLinkState::Disconnected;
    for (i, &state) in states.iter().enumerate() {
        assert!(
            is_single_step(previous, state),
            "invalid step #{}: {} -> {}",
            i,
            previous,
            state
        );
        previous = state;
    }
    assert_eq!(previous, link.state());

    let sent = transport.sent.lock().clone();
    let mut seen = HashSet::new();
    for (channel, sequence) in &sent {
        assert!(
            seen.insert(*sequence),
            "message #{} delivered twice (last via {:?})",
            sequence,
            channel
        );
    }
    let stats = link.stats();
    assert_eq!(
        stats.transient_sent + stats.durable_sent,
        sent.len() as u64
    );
}
