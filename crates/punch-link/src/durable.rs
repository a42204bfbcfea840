//! Durable 快照存储
//!
//! 每种消息只保留最新的一条（latest wins）。存储顺序即入队顺序：
//! 被覆盖的种类移动到队尾，补发时按该顺序逐条投递。

use crate::transport::OutboundMessage;
use punch_protocol::MessageKind;

/// 按种类保存最新值的待投递队列
#[derive(Debug, Default)]
pub struct DurableStore {
    entries: Vec<OutboundMessage>,
}

impl DurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入一条消息
    ///
    /// 同种类的旧消息会被替换，并返回被替换的那条。
    pub fn put(&mut self, message: OutboundMessage) -> Option<OutboundMessage> {
        let superseded = self
            .entries
            .iter()
            .position(|m| m.kind == message.kind)
            .map(|index| self.entries.remove(index));
        self.entries.push(message);
        superseded
    }

    /// 取出全部消息（按入队顺序），存储清空
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.entries)
    }

    /// 把补发失败的消息放回队首
    ///
    /// 补发期间已有更新同种类消息入队的，旧消息直接丢弃。
    /// 返回实际放回的条数。
    pub fn restore(&mut self, failed: Vec<OutboundMessage>) -> usize {
        let mut restored: Vec<OutboundMessage> = failed
            .into_iter()
            .filter(|m| !self.contains(m.kind))
            .collect();
        let count = restored.len();
        restored.append(&mut self.entries);
        self.entries = restored;
        count
    }

    /// 丢弃同种类、且比 `sequence` 更早入队的消息
    ///
    /// 即时投递成功后调用，避免旧快照在重连后覆盖对端的新数据。
    pub fn discard_older(&mut self, kind: MessageKind, sequence: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|m| !(m.kind == kind && m.sequence < sequence));
        self.entries.len() != before
    }

    pub fn contains(&self, kind: MessageKind) -> bool {
        self.entries.iter().any(|m| m.kind == kind)
    }

    pub fn get(&self, kind: MessageKind) -> Option<&OutboundMessage> {
        self.entries.iter().find(|m| m.kind == kind)
    }

    /// 当前待投递的种类（按入队顺序）
    pub fn kinds(&self) -> Vec<MessageKind> {
        self.entries.iter().map(|m| m.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punch_protocol::{WireMessage, WorkoutStatus};
    use std::time::Duration;

    fn message(seq: u64, wire: WireMessage) -> OutboundMessage {
        OutboundMessage::new(seq, &wire, Duration::from_millis(seq)).unwrap()
    }

    fn punch(seq: u64, speed: f64) -> OutboundMessage {
        message(seq, WireMessage::punch(speed, false, Duration::from_secs(seq)))
    }

    fn workout(seq: u64) -> OutboundMessage {
        message(
            seq,
            WireMessage::workout(WorkoutStatus::Started, Duration::from_secs(seq)),
        )
    }

    #[test]
    fn test_latest_wins_per_kind() {
        let mut store = DurableStore::new();
        assert!(store.put(punch(1, 10.0)).is_none());
        let old = store.put(punch(2, 20.0)).unwrap();
        assert_eq!(old.sequence, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(MessageKind::PunchData).unwrap().sequence, 2);
    }

    #[test]
    fn test_drain_in_enqueue_order() {
        let mut store = DurableStore::new();
        store.put(punch(1, 10.0));
        store.put(workout(2));
        store.put(punch(3, 30.0));

        // punchData 被覆盖后移到队尾
        assert_eq!(
            store.kinds(),
            vec![MessageKind::WorkoutStatus, MessageKind::PunchData]
        );

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sequence, 2);
        assert_eq!(drained[1].sequence, 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_skips_superseded() {
        let mut store = DurableStore::new();
        store.put(punch(1, 10.0));
        store.put(workout(2));
        let failed = store.drain();

        // 补发期间有新的 punchData 入队
        store.put(punch(5, 50.0));

        assert_eq!(store.restore(failed), 1);
        assert_eq!(
            store.kinds(),
            vec![MessageKind::WorkoutStatus, MessageKind::PunchData]
        );
        assert_eq!(store.get(MessageKind::PunchData).unwrap().sequence, 5);
    }

    #[test]
    fn test_discard_older() {
        let mut store = DurableStore::new();
        store.put(punch(1, 10.0));
        assert!(!store.discard_older(MessageKind::PunchData, 1));
        assert!(store.discard_older(MessageKind::PunchData, 2));
        assert!(store.is_empty());
    }
}
