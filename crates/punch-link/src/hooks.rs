//! 连接观察者（Link Observer）
//!
//! 状态变化只在状态真正改变时通知，通知在连接层释放内部锁之后发出。
//!
//! # 使用示例
//!
//! ```rust
//! use punch_link::hooks::{ChannelLinkObserver, LinkNotification, LinkObserver, ObserverList};
//! use punch_link::DeviceLinkState;
//! use std::sync::Arc;
//!
//! let mut observers = ObserverList::new();
//! let (observer, rx) = ChannelLinkObserver::new(16);
//! observers.add(Arc::new(observer) as Arc<dyn LinkObserver>);
//!
//! observers.notify_state(DeviceLinkState::Connected);
//! assert_eq!(rx.try_recv().unwrap(), LinkNotification::StateChanged(DeviceLinkState::Connected));
//! ```

use crate::state::DeviceLinkState;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 连接观察者 Trait
///
/// 回调在调用 `DeviceLink` 方法的线程上同步执行（可能是调度线程），
/// 实现应当非阻塞。
pub trait LinkObserver: Send + Sync {
    /// 连接状态改变
    fn on_link_state_changed(&self, state: DeviceLinkState);

    /// 自动重连次数耗尽（每个重连周期最多通知一次）
    ///
    /// 默认为空操作。
    fn on_reconnect_exhausted(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// 观察者列表
///
/// 列表本身不做同步，由 `DeviceLink` 放在 `RwLock` 中。
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Arc<dyn LinkObserver>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn LinkObserver>) {
        self.observers.push(observer);
    }

    /// 移除观察者（按指针比较），返回是否找到
    pub fn remove(&mut self, observer: &Arc<dyn LinkObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !Arc::ptr_eq(o, observer));
        self.observers.len() != before
    }

    pub fn notify_state(&self, state: DeviceLinkState) {
        for observer in &self.observers {
            observer.on_link_state_changed(state);
        }
    }

    pub fn notify_exhausted(&self, attempts: u32) {
        for observer in &self.observers {
            observer.on_reconnect_exhausted(attempts);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// 转发给 Channel 的通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkNotification {
    StateChanged(DeviceLinkState),
    ReconnectExhausted { attempts: u32 },
}

/// 把通知转发到有界 Channel 的观察者
///
/// 队列满时丢弃通知并计数，不阻塞连接层。
pub struct ChannelLinkObserver {
    tx: Sender<LinkNotification>,
    dropped: Arc<AtomicU64>,
}

impl ChannelLinkObserver {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<LinkNotification>) {
        let (tx, rx) = bounded(capacity.max(1));
        let observer = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (observer, rx)
    }

    /// 丢弃的通知数
    pub fn dropped(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }

    fn forward(&self, notification: LinkNotification) {
        if self.tx.try_send(notification).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl LinkObserver for ChannelLinkObserver {
    fn on_link_state_changed(&self, state: DeviceLinkState) {
        self.forward(LinkNotification::StateChanged(state));
    }

    fn on_reconnect_exhausted(&self, attempts: u32) {
        self.forward(LinkNotification::ReconnectExhausted { attempts });
    }
}
