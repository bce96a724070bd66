//! The durable-queue contract consumed from the host.
//!
//! The queue itself (persistence, replay across restarts) is the host's
//! concern and out of scope here; this trait is what the worker is written
//! against, and [`memory::InMemoryQueue`] is the reference implementation
//! the integration tests drive.

pub mod memory;

use crate::message::RenderedMessage;

/// Thread-safe message queue with backlog (in-flight, unacknowledged
/// entries) support for `explicit_commits` mode.
pub trait Queue: Send + Sync {
    /// Append a message at the tail.
    fn push_tail(&self, msg: RenderedMessage);

    /// Pop the head message, if any.
    fn pop_head(&self) -> Option<RenderedMessage>;

    /// Rewind a single message back onto the head of the queue (used when
    /// `explicit_commits` is off).
    fn push_head(&self, msg: RenderedMessage);

    /// Rewind the most recently popped `n` backlog entries back onto the
    /// head of the queue, preserving their original order.
    fn rewind_backlog(&self, n: usize);

    /// Rewind every entry currently in the backlog.
    fn rewind_backlog_all(&self);

    /// Permanently acknowledge (discard) the oldest `n` backlog entries.
    /// Called after a successful `COMMIT` with `n == flush_counter`.
    fn ack_backlog(&self, n: usize);

    /// Register a callback invoked whenever a message becomes available.
    /// Registering replaces any previously registered callback.
    fn check_items(&self, callback: Box<dyn Fn() + Send + Sync>);

    /// Number of messages not yet popped.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enable or disable backlog tracking.
    fn set_use_backlog(&self, enabled: bool);

    /// Reset any parallel-push bookkeeping. The host's queue may batch
    /// pushes from multiple producer threads; this is a no-op for the
    /// single-threaded reference implementation.
    fn reset_parallel_push(&self);
}
