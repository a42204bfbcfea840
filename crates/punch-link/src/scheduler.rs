//! 定时器调度
//!
//! 连接层的重连退避依赖定时器。定时器通过 [`Scheduler`] 注入：
//!
//! - [`ThreadScheduler`]: 单个后台线程 + `crossbeam-channel` 命令队列（生产环境）
//! - [`ManualScheduler`]: 虚拟时间，手动推进（测试），同时实现 [`Clock`]
//!
//! # 约定
//!
//! `schedule` 永远不会同步执行任务，调用方可以在持锁时调度。

use crate::clock::Clock;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 定时任务
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// 定时器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// 定时器调度接口
pub trait Scheduler: Send + Sync {
    /// 在 `delay` 之后执行 `task`
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// 取消尚未执行的定时器（已执行或不存在时为空操作）
    fn cancel(&self, id: TimerId);
}

enum Command {
    Schedule {
        id: TimerId,
        deadline: Instant,
        task: TimerTask,
    },
    Cancel(TimerId),
    Shutdown,
}

/// 后台线程调度器
///
/// 任务在调度线程上串行执行，执行时间应尽量短。
pub struct ThreadScheduler {
    tx: Sender<Command>,
    next_id: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    /// 启动调度线程
    ///
    /// # 错误
    ///
    /// 线程创建失败时返回 IO 错误。
    pub fn new() -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("punch-link-timer".into())
            .spawn(move || run_timer_loop(rx))?;
        Ok(Self {
            tx,
            next_id: AtomicU64::new(1),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// 停止调度线程，未到期的任务被丢弃
    ///
    /// 在调度线程内部调用时只发送停止命令，不等待。
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("Timer thread panicked");
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let command = Command::Schedule {
            id,
            deadline: Instant::now() + delay,
            task,
        };
        if self.tx.send(command).is_err() {
            warn!("Timer thread stopped, dropping timer {}", id.0);
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.tx.send(Command::Cancel(id));
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer_loop(rx: Receiver<Command>) {
    let mut deadlines: BinaryHeap<Reverse<(Instant, TimerId)>> = BinaryHeap::new();
    let mut tasks: HashMap<TimerId, TimerTask> = HashMap::new();

    loop {
        let now = Instant::now();
        while let Some(&Reverse((deadline, id))) = deadlines.peek() {
            if deadline > now {
                break;
            }
            deadlines.pop();
            // 已取消的定时器不在 tasks 中
            if let Some(task) = tasks.remove(&id) {
                trace!("Timer {} fired", id.0);
                task();
            }
        }

        let command = match deadlines.peek() {
            Some(&Reverse((deadline, _))) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            },
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Schedule { id, deadline, task } => {
                deadlines.push(Reverse((deadline, id)));
                tasks.insert(id, task);
            },
            Command::Cancel(id) => {
                tasks.remove(&id);
            },
            Command::Shutdown => break,
        }
    }

    trace!("Timer thread exiting, {} pending timers dropped", tasks.len());
}

struct ManualTimer {
    id: TimerId,
    due: Duration,
    task: TimerTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    pending: Vec<ManualTimer>,
    history: Vec<Duration>,
}

/// 虚拟时间调度器（测试用）
///
/// 时间只在 [`advance`](Self::advance) 时前进；到期任务在调用线程上按到期顺序执行。
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进虚拟时间，返回执行的任务数
    ///
    /// 任务执行期间新调度的定时器若在目标时间之前到期，也会在本次推进中执行。
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut fired = 0;
        loop {
            let task = {
                let mut state = self.state.lock();
                let next = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let timer = state.pending.remove(index);
                        state.now = timer.due;
                        timer.task
                    },
                    None => {
                        state.now = target;
                        break;
                    },
                }
            };
            task();
            fired += 1;
        }
        fired
    }

    /// 所有 `schedule` 调用的延迟（按调用顺序，含已取消的）
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.state.lock().history.clone()
    }

    /// 尚未执行且未取消的定时器数
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl Clock for ManualScheduler {
    fn now(&self) -> Duration {
        self.state.lock().now
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let due = state.now + delay;
        state.history.push(delay);
        state.pending.push(ManualTimer { id, due, task });
        id
    }

    fn cancel(&self, id: TimerId) {
        self.state.lock().pending.retain(|t| t.id != id);
    }
}
