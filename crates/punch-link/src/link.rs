//! 设备连接（DeviceLink）
//!
//! 连接状态机 + 投递策略：
//!
//! - 状态转换见 [`transition`](crate::state::transition)，无效事件为空操作
//! - 即时投递仅在 `Connected` 且限流器放行时进行，否则降级为 Durable
//! - 进入 `Connected` 时按入队顺序补发 Durable 消息，每条恰好一次
//! - 激活成功时查询 [`Transport::is_reachable`]，对端不可达则立即进入 `Degraded`
//! - 激活失败后按 `attempt × backoff_step` 退避重试，次数耗尽后通知观察者一次
//!
//! # 锁与副作用
//!
//! 状态在 `inner` 锁内计算，得到一组副作用（通知、激活、补发）。
//! 副作用在释放 `inner` 之后执行，并由可重入的 `effects` 锁串行化，
//! 保证观察者看到的状态序列与实际转换顺序一致。传输层同步回调
//! （例如在 `activate` 内直接报告失败）不会死锁。

use crate::clock::{Clock, MonotonicClock};
use crate::durable::DurableStore;
use crate::error::LinkError;
use crate::hooks::{LinkObserver, ObserverList};
use crate::rate_limit::RateLimiter;
use crate::scheduler::{Scheduler, ThreadScheduler, TimerId};
use crate::state::{DeviceLinkState, LinkEvent, transition};
use crate::transport::{OutboundMessage, Transport};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use punch_protocol::{DeliveryChannel, MessageKind, Payload, WireMessage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 连接配置
///
/// 时间字段以毫秒为单位，便于写入 TOML。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 退避步长：第 n 次重试前等待 `n × backoff_step_ms`
    pub backoff_step_ms: u64,
    /// 自动重试次数上限
    pub max_retries: u32,
    /// 两次即时投递之间的最小间隔
    pub transient_min_interval_ms: u64,
    /// 激活失败后是否自动重试
    pub auto_reconnect: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            backoff_step_ms: 2000,
            max_retries: 3,
            transient_min_interval_ms: 500,
            auto_reconnect: true,
        }
    }
}

impl LinkConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn transient_min_interval(&self) -> Duration {
        Duration::from_millis(self.transient_min_interval_ms)
    }

    /// 第 `attempt` 次重试前的等待时间（`attempt` 从 1 开始）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_step() * attempt
    }

    /// 检查配置
    ///
    /// # 错误
    ///
    /// 退避步长或即时投递间隔为 0 时返回 `LinkError::InvalidConfig`。
    pub fn validate(&self) -> Result<(), LinkError> {
        for (field, value) in [
            ("backoff_step_ms", self.backoff_step_ms),
            ("transient_min_interval_ms", self.transient_min_interval_ms),
        ] {
            if value == 0 {
                return Err(LinkError::InvalidConfig {
                    field,
                    reason: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 一次 `send` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 已提交即时投递
    Transient,
    /// 已降级为 Durable，等待下次连通后补发
    Durable(DemoteReason),
}

/// 降级原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoteReason {
    /// 当前不是 `Connected`
    NotConnected,
    /// 即时投递限流
    RateLimited,
    /// 传输层拒绝了即时投递
    TransportFailed,
    /// 传输层事后报告投递失败
    DeliveryFailed,
}

/// 连接统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkStats {
    pub transient_sent: u64,
    pub durable_sent: u64,
    pub demoted: u64,
    pub rate_limited: u64,
    /// 被同种类更新消息替换掉的 Durable 消息
    pub superseded: u64,
    pub activation_attempts: u64,
}

#[derive(Debug, Default)]
struct LinkCounters {
    transient_sent: AtomicU64,
    durable_sent: AtomicU64,
    demoted: AtomicU64,
    rate_limited: AtomicU64,
    superseded: AtomicU64,
    activation_attempts: AtomicU64,
}

impl LinkCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LinkStats {
        LinkStats {
            transient_sent: self.transient_sent.load(Ordering::Relaxed),
            durable_sent: self.durable_sent.load(Ordering::Relaxed),
            demoted: self.demoted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            activation_attempts: self.activation_attempts.load(Ordering::Relaxed),
        }
    }
}

struct LinkInner {
    state: DeviceLinkState,
    /// 当前重连周期内已安排的自动重试次数
    attempt: u32,
    retry_timer: Option<TimerId>,
    /// 每次开始新的重连周期或拆除时递增，过期定时器据此失效
    generation: u64,
    exhausted: bool,
    durable: DurableStore,
    limiter: RateLimiter,
    status_snapshot: Option<OutboundMessage>,
    /// 每种消息最近一次成功提交的序号
    delivered: HashMap<MessageKind, u64>,
    next_sequence: u64,
}

impl LinkInner {
    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// 是否已有同种类的更新消息（待补发或已提交）
    fn has_newer(&self, message: &OutboundMessage) -> bool {
        let pending = self
            .durable
            .get(message.kind)
            .is_some_and(|m| m.sequence > message.sequence);
        let delivered = self
            .delivered
            .get(&message.kind)
            .is_some_and(|&seq| seq > message.sequence);
        pending || delivered
    }

    fn mark_delivered(&mut self, message: &OutboundMessage) {
        let entry = self.delivered.entry(message.kind).or_insert(0);
        *entry = (*entry).max(message.sequence);
    }
}

enum Effect {
    Notify(DeviceLinkState),
    Exhausted(u32),
    Activate,
    CheckReachability,
    Flush(Vec<OutboundMessage>),
    SendSnapshot(OutboundMessage),
}

/// 设备连接
///
/// 通过 [`DeviceLinkBuilder`] 或 [`DeviceLink::new`] 创建，总是以 `Arc` 持有
/// （重连定时器持有弱引用）。
///
/// # 示例
///
/// ```rust
/// use punch_link::{DeviceLink, DeviceLinkState, LinkConfig};
/// use punch_link::scheduler::ManualScheduler;
/// use punch_link::transport::ChannelTransport;
/// use std::sync::Arc;
///
/// let (transport, _rx) = ChannelTransport::new(64);
/// transport.set_reachable(true);
/// let scheduler = Arc::new(ManualScheduler::new());
/// let link = DeviceLink::new(
///     LinkConfig::default(),
///     Arc::new(transport),
///     scheduler.clone(),
///     scheduler,
/// );
///
/// link.activate();
/// link.on_activation_result(true);
/// assert_eq!(link.state(), DeviceLinkState::Connected);
/// ```
pub struct DeviceLink {
    config: LinkConfig,
    inner: Mutex<LinkInner>,
    effects: ReentrantMutex<()>,
    observers: RwLock<ObserverList>,
    counters: LinkCounters,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    weak_self: Weak<DeviceLink>,
}

impl DeviceLink {
    /// 创建连接（初始状态 `Disconnected`）
    pub fn new(
        config: LinkConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let limiter = RateLimiter::new(config.transient_min_interval());
        Arc::new_cyclic(|weak_self| Self {
            config,
            inner: Mutex::new(LinkInner {
                state: DeviceLinkState::Disconnected,
                attempt: 0,
                retry_timer: None,
                generation: 0,
                exhausted: false,
                durable: DurableStore::new(),
                limiter,
                status_snapshot: None,
                delivered: HashMap::new(),
                next_sequence: 0,
            }),
            effects: ReentrantMutex::new(()),
            observers: RwLock::new(ObserverList::new()),
            counters: LinkCounters::default(),
            transport,
            scheduler,
            clock,
            weak_self: weak_self.clone(),
        })
    }

    pub fn builder(transport: Arc<dyn Transport>) -> DeviceLinkBuilder {
        DeviceLinkBuilder::new(transport)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn state(&self) -> DeviceLinkState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// 当前重连周期内已安排的自动重试次数
    pub fn retry_attempt(&self) -> u32 {
        self.inner.lock().attempt
    }

    /// 待补发的消息种类（按入队顺序）
    pub fn pending_durable(&self) -> Vec<MessageKind> {
        self.inner.lock().durable.kinds()
    }

    /// 当前状态快照的负载
    pub fn status_snapshot(&self) -> Option<Payload> {
        self.inner
            .lock()
            .status_snapshot
            .as_ref()
            .map(|m| m.payload.clone())
    }

    pub fn add_observer(&self, observer: Arc<dyn LinkObserver>) {
        self.observers.write().add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn LinkObserver>) -> bool {
        self.observers.write().remove(observer)
    }

    /// 显式激活，开始新的重连周期
    ///
    /// 仅在 `Disconnected` 时有效；返回事件是否被接受。
    pub fn activate(&self) -> bool {
        self.apply(LinkEvent::Activate)
    }

    /// 平台报告激活结果
    pub fn on_activation_result(&self, success: bool) -> bool {
        self.apply(LinkEvent::ActivationAck { success })
    }

    /// 平台报告可达性变化
    pub fn on_reachability_changed(&self, reachable: bool) -> bool {
        if reachable {
            self.apply(LinkEvent::ReachabilityRestored)
        } else {
            self.apply(LinkEvent::ReachabilityLost)
        }
    }

    /// 平台使会话失效，不会自动重连
    pub fn session_invalidated(&self) -> bool {
        self.apply(LinkEvent::SessionInvalidated)
    }

    /// 拆除连接：取消定时器、清空待补发消息、强制 `Disconnected`
    pub fn teardown(&self) {
        self.apply(LinkEvent::Teardown);
    }

    /// 投递一条消息
    ///
    /// # 错误
    ///
    /// 只有消息本身不合法时返回错误；传输失败会降级为 Durable。
    pub fn send(&self, message: &WireMessage) -> Result<Delivery, LinkError> {
        let outbound = {
            let mut inner = self.inner.lock();
            let sequence = inner.next_sequence();
            let outbound = OutboundMessage::new(sequence, message, self.clock.now())?;
            let demoted = if !inner.state.is_reachable() {
                Some(DemoteReason::NotConnected)
            } else if !inner.limiter.try_acquire(outbound.enqueued_at) {
                LinkCounters::bump(&self.counters.rate_limited);
                Some(DemoteReason::RateLimited)
            } else {
                None
            };
            if let Some(reason) = demoted {
                self.demote(&mut inner, outbound, reason);
                return Ok(Delivery::Durable(reason));
            }
            outbound
        };

        match self.transport.send(&outbound, DeliveryChannel::Transient) {
            Ok(()) => {
                LinkCounters::bump(&self.counters.transient_sent);
                debug!("Sent {} #{} (transient)", outbound.kind, outbound.sequence);
                let mut inner = self.inner.lock();
                inner.mark_delivered(&outbound);
                inner.durable.discard_older(outbound.kind, outbound.sequence);
                Ok(Delivery::Transient)
            },
            Err(e) => {
                debug!("Transient send of {} failed: {}", outbound.kind, e);
                let reason = DemoteReason::TransportFailed;
                let mut inner = self.inner.lock();
                self.demote(&mut inner, outbound, reason);
                Ok(Delivery::Durable(reason))
            },
        }
    }

    /// 传输层事后报告即时投递失败，消息降级为 Durable
    ///
    /// 已有同种类更新消息时丢弃。
    pub fn on_delivery_failed(&self, message: OutboundMessage) {
        let mut inner = self.inner.lock();
        if inner.has_newer(&message) {
            trace!("Dropping failed {} #{}, superseded", message.kind, message.sequence);
            return;
        }
        self.demote(&mut inner, message, DemoteReason::DeliveryFailed);
    }

    /// 设置状态快照（最近一次训练状态），在可达性恢复后重发
    ///
    /// # 错误
    ///
    /// 消息不合法时返回 `LinkError::Protocol`。
    pub fn set_status_snapshot(&self, message: &WireMessage) -> Result<(), LinkError> {
        let mut inner = self.inner.lock();
        let sequence = inner.next_sequence();
        let snapshot = OutboundMessage::new(sequence, message, self.clock.now())?;
        inner.status_snapshot = Some(snapshot);
        Ok(())
    }

    /// 在 `Connected` 状态下手动补发待投递消息，返回尝试的条数
    pub fn flush_pending(&self) -> usize {
        let _serial = self.effects.lock();
        let pending = {
            let mut inner = self.inner.lock();
            if !inner.state.is_reachable() {
                return 0;
            }
            inner.durable.drain()
        };
        let count = pending.len();
        self.flush(pending);
        count
    }

    fn demote(&self, inner: &mut LinkInner, message: OutboundMessage, reason: DemoteReason) {
        debug!(
            "Demoting {} #{} to durable ({:?})",
            message.kind, message.sequence, reason
        );
        LinkCounters::bump(&self.counters.demoted);
        if let Some(old) = inner.durable.put(message) {
            trace!("Superseded durable {} #{}", old.kind, old.sequence);
            LinkCounters::bump(&self.counters.superseded);
        }
    }

    fn apply(&self, event: LinkEvent) -> bool {
        let _serial = self.effects.lock();
        let effects = {
            let mut inner = self.inner.lock();
            match self.plan(&mut inner, event) {
                Some(effects) => effects,
                None => return false,
            }
        };
        self.run(effects);
        true
    }

    /// 在 `inner` 锁内完成状态转换，返回需要在锁外执行的副作用
    fn plan(&self, inner: &mut LinkInner, event: LinkEvent) -> Option<Vec<Effect>> {
        if let LinkEvent::ReconnectTimer { generation } = event {
            if generation != inner.generation {
                trace!("Ignoring stale reconnect timer (generation {})", generation);
                return None;
            }
            inner.retry_timer = None;
        }

        let from = inner.state;
        let Some(to) = transition(from, event) else {
            trace!("Ignoring {:?} in state {}", event, from);
            return None;
        };
        inner.state = to;

        let mut effects = Vec::new();
        if from != to {
            info!("Link {} -> {} ({:?})", from, to, event);
            effects.push(Effect::Notify(to));
        }

        match event {
            LinkEvent::Activate => {
                self.cancel_retry(inner);
                inner.generation += 1;
                inner.attempt = 0;
                inner.exhausted = false;
                effects.push(Effect::Activate);
            },
            LinkEvent::ReconnectTimer { .. } => effects.push(Effect::Activate),
            LinkEvent::ActivationAck { success: true } | LinkEvent::ReachabilityRestored => {
                self.cancel_retry(inner);
                inner.attempt = 0;
                inner.exhausted = false;
                if event != LinkEvent::ReachabilityRestored {
                    effects.push(Effect::CheckReachability);
                }

                let mut pending = inner.durable.drain();
                let flushes_status = pending.iter().any(|m| m.kind == MessageKind::WorkoutStatus);
                let mut snapshot = None;
                if event == LinkEvent::ReachabilityRestored
                    && !flushes_status
                    && let Some(status) = inner.status_snapshot.clone()
                {
                    // 快照同样受即时投递限流；被限流时随本次补发走 Durable
                    if inner.limiter.try_acquire(self.clock.now()) {
                        snapshot = Some(status);
                    } else {
                        debug!(
                            "Status snapshot #{} rate limited, flushing as durable",
                            status.sequence
                        );
                        LinkCounters::bump(&self.counters.rate_limited);
                        LinkCounters::bump(&self.counters.demoted);
                        pending.push(status);
                    }
                }
                if !pending.is_empty() {
                    effects.push(Effect::Flush(pending));
                }
                if let Some(snapshot) = snapshot {
                    effects.push(Effect::SendSnapshot(snapshot));
                }
            },
            LinkEvent::ActivationAck { success: false } => self.plan_retry(inner, &mut effects),
            LinkEvent::SessionInvalidated => {
                self.cancel_retry(inner);
            },
            LinkEvent::Teardown => {
                self.cancel_retry(inner);
                inner.generation += 1;
                inner.attempt = 0;
                inner.exhausted = false;
                inner.durable.clear();
                inner.limiter.reset();
                inner.status_snapshot = None;
                inner.delivered.clear();
            },
            LinkEvent::ReachabilityLost => {},
        }

        Some(effects)
    }

    fn plan_retry(&self, inner: &mut LinkInner, effects: &mut Vec<Effect>) {
        if !self.config.auto_reconnect {
            return;
        }
        if inner.attempt < self.config.max_retries {
            inner.attempt += 1;
            let delay = self.config.backoff_delay(inner.attempt);
            let generation = inner.generation;
            let weak = self.weak_self.clone();
            let id = self.scheduler.schedule(
                delay,
                Box::new(move || {
                    if let Some(link) = weak.upgrade() {
                        link.apply(LinkEvent::ReconnectTimer { generation });
                    }
                }),
            );
            inner.retry_timer = Some(id);
            info!(
                "Activation failed, retry {}/{} in {:?}",
                inner.attempt, self.config.max_retries, delay
            );
        } else if !inner.exhausted {
            inner.exhausted = true;
            warn!(
                "Activation failed after {} retries, giving up",
                inner.attempt
            );
            effects.push(Effect::Exhausted(inner.attempt));
        }
    }

    fn cancel_retry(&self, inner: &mut LinkInner) {
        if let Some(id) = inner.retry_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(state) => self.observers.read().notify_state(state),
                Effect::Exhausted(attempts) => self.observers.read().notify_exhausted(attempts),
                Effect::Activate => {
                    LinkCounters::bump(&self.counters.activation_attempts);
                    if let Err(e) = self.transport.activate() {
                        warn!("Activation request failed: {}", e);
                        self.apply(LinkEvent::ActivationAck { success: false });
                    }
                },
                Effect::CheckReachability => {
                    if !self.transport.is_reachable() {
                        debug!("Activated but peer unreachable");
                        self.apply(LinkEvent::ReachabilityLost);
                    }
                },
                Effect::Flush(messages) => self.flush(messages),
                Effect::SendSnapshot(snapshot) => self.send_snapshot(snapshot),
            }
        }
    }

    /// 按顺序补发；失败时把失败的及其后的消息放回（已被替换的除外）
    fn flush(&self, messages: Vec<OutboundMessage>) {
        let total = messages.len();
        let mut sent = 0;
        let mut remaining = messages.into_iter();
        while let Some(message) = remaining.next() {
            match self.transport.send(&message, DeliveryChannel::Durable) {
                Ok(()) => {
                    sent += 1;
                    LinkCounters::bump(&self.counters.durable_sent);
                    debug!("Flushed {} #{} (durable)", message.kind, message.sequence);
                    self.inner.lock().mark_delivered(&message);
                },
                Err(e) => {
                    let failed: Vec<OutboundMessage> =
                        std::iter::once(message).chain(remaining).collect();
                    let restored = self.inner.lock().durable.restore(failed);
                    warn!(
                        "Durable flush failed after {}/{}: {}; {} re-queued",
                        sent, total, e, restored
                    );
                    return;
                },
            }
        }
    }

    fn send_snapshot(&self, snapshot: OutboundMessage) {
        match self.transport.send(&snapshot, DeliveryChannel::Transient) {
            Ok(()) => {
                LinkCounters::bump(&self.counters.transient_sent);
                debug!("Re-sent status snapshot #{}", snapshot.sequence);
                self.inner.lock().mark_delivered(&snapshot);
            },
            Err(e) => {
                debug!("Status snapshot send failed: {}", e);
                let mut inner = self.inner.lock();
                if !inner.has_newer(&snapshot) {
                    self.demote(&mut inner, snapshot, DemoteReason::TransportFailed);
                }
            },
        }
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        if let Some(id) = self.inner.get_mut().retry_timer.take() {
            self.scheduler.cancel(id);
        }
    }
}

/// DeviceLink Builder（链式构造）
///
/// 未指定调度器时启动一个 [`ThreadScheduler`]，未指定时钟时使用 [`MonotonicClock`]。
///
/// # Example
///
/// ```no_run
/// use punch_link::{DeviceLink, LinkConfig};
/// use punch_link::transport::ChannelTransport;
/// use std::sync::Arc;
///
/// let (transport, _rx) = ChannelTransport::new(64);
/// let link = DeviceLink::builder(Arc::new(transport))
///     .config(LinkConfig { max_retries: 5, ..Default::default() })
///     .build()
///     .unwrap();
/// ```
pub struct DeviceLinkBuilder {
    transport: Arc<dyn Transport>,
    config: LinkConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
    observers: Vec<Arc<dyn LinkObserver>>,
}

impl DeviceLinkBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: LinkConfig::default(),
            scheduler: None,
            clock: None,
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LinkObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// 构造连接
    ///
    /// # 错误
    ///
    /// - `LinkError::InvalidConfig`: 配置无效
    /// - `LinkError::TimerThread`: 默认调度线程启动失败
    pub fn build(self) -> Result<Arc<DeviceLink>, LinkError> {
        self.config.validate()?;
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(ThreadScheduler::new()?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock));
        let link = DeviceLink::new(self.config, self.transport, scheduler, clock);
        for observer in self.observers {
            link.add_observer(observer);
        }
        Ok(link)
    }
}
