//! Reference in-memory [`Queue`] implementation, used by the integration
//! test suite in place of the host's real durable backlog.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::message::RenderedMessage;

use super::Queue;

struct Inner {
    queue: VecDeque<RenderedMessage>,
    backlog: VecDeque<RenderedMessage>,
    use_backlog: bool,
    callback: Option<Box<dyn Fn() + Send + Sync>>,
}

/// A plain `Mutex`-guarded `VecDeque` pair: one for not-yet-popped
/// messages, one for popped-but-unacknowledged ones (the backlog).
pub struct InMemoryQueue {
    inner: Mutex<Inner>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                backlog: VecDeque::new(),
                use_backlog: false,
                callback: None,
            }),
        }
    }

    /// Snapshot of backlog length, for test assertions.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().unwrap().backlog.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue for InMemoryQueue {
    fn push_tail(&self, msg: RenderedMessage) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(msg);
        if let Some(callback) = inner.callback.as_ref() {
            callback();
        }
    }

    fn pop_head(&self) -> Option<RenderedMessage> {
        let mut inner = self.inner.lock().unwrap();
        let msg = inner.queue.pop_front()?;
        if inner.use_backlog {
            inner.backlog.push_back(msg.clone());
        }
        Some(msg)
    }

    fn push_head(&self, msg: RenderedMessage) {
        let mut inner = self.inner.lock().unwrap();
        if inner.use_backlog {
            inner.backlog.pop_back();
        }
        inner.queue.push_front(msg);
    }

    fn rewind_backlog(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        let take = n.min(inner.backlog.len());
        let start = inner.backlog.len() - take;
        let rewound: Vec<RenderedMessage> = inner.backlog.drain(start..).collect();
        for msg in rewound.into_iter().rev() {
            inner.queue.push_front(msg);
        }
    }

    fn rewind_backlog_all(&self) {
        let len = self.inner.lock().unwrap().backlog.len();
        self.rewind_backlog(len);
    }

    fn ack_backlog(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        let take = n.min(inner.backlog.len());
        inner.backlog.drain(0..take);
    }

    fn check_items(&self, callback: Box<dyn Fn() + Send + Sync>) {
        self.inner.lock().unwrap().callback = Some(callback);
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    fn set_use_backlog(&self, enabled: bool) {
        self.inner.lock().unwrap().use_backlog = enabled;
    }

    fn reset_parallel_push(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(table: &str) -> RenderedMessage {
        RenderedMessage::new(table, vec!["v".to_string()])
    }

    #[test]
    fn push_pop_round_trips_in_fifo_order() {
        let q = InMemoryQueue::new();
        q.push_tail(msg("a"));
        q.push_tail(msg("b"));
        assert_eq!(q.pop_head().unwrap().table, "a");
        assert_eq!(q.pop_head().unwrap().table, "b");
        assert!(q.pop_head().is_none());
    }

    #[test]
    fn push_head_without_backlog_requeues_at_front() {
        let q = InMemoryQueue::new();
        q.push_tail(msg("a"));
        let popped = q.pop_head().unwrap();
        q.push_head(popped);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_head().unwrap().table, "a");
    }

    #[test]
    fn backlog_rewind_preserves_order() {
        let q = InMemoryQueue::new();
        q.set_use_backlog(true);
        q.push_tail(msg("a"));
        q.push_tail(msg("b"));
        q.push_tail(msg("c"));
        q.pop_head();
        q.pop_head();
        q.pop_head();
        assert_eq!(q.backlog_len(), 3);

        q.rewind_backlog_all();
        assert_eq!(q.backlog_len(), 0);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop_head().unwrap().table, "a");
        assert_eq!(q.pop_head().unwrap().table, "b");
        assert_eq!(q.pop_head().unwrap().table, "c");
    }

    #[test]
    fn ack_backlog_discards_oldest_entries() {
        let q = InMemoryQueue::new();
        q.set_use_backlog(true);
        q.push_tail(msg("a"));
        q.push_tail(msg("b"));
        q.pop_head();
        q.pop_head();
        q.ack_backlog(2);
        assert_eq!(q.backlog_len(), 0);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn rewind_backlog_one_rewinds_only_most_recent() {
        let q = InMemoryQueue::new();
        q.set_use_backlog(true);
        q.push_tail(msg("a"));
        q.push_tail(msg("b"));
        q.pop_head();
        q.pop_head();
        q.rewind_backlog(1);
        assert_eq!(q.backlog_len(), 1);
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop_head().unwrap().table, "b");
    }
}
