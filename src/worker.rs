//! Transaction/worker loop: the state machine that dequeues messages,
//! manages transaction boundaries, handles commit failures, retries,
//! suspension, and graceful shutdown.
//!
//! This is the one piece of the core that owns everything else: the
//! connection, the schema reconciler, the transaction state, and the
//! retry/suspend bookkeeping that is exclusive to this thread.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::DestinationConfig;
use crate::connection::ConnectionManager;
use crate::driver::DriverFactory;
use crate::error::{DestinationError, Result};
use crate::message::RenderedMessage;
use crate::persist::{self, PersistenceStore};
use crate::queue::Queue;
use crate::schema::SchemaReconciler;
use crate::statement;
use crate::stats::DestinationCounters;
use crate::txn::{self, TxnState};

struct SignalState {
    terminate: bool,
    suspended: bool,
    suspend_deadline: Option<Instant>,
}

/// The mutex/condvar pair guarding exactly the three fields shared between
/// host and worker threads. Queue contents have their own
/// synchronization (`queue::Queue` is `Send + Sync` on its own); this type
/// only arbitrates `terminate`, `suspended`, and `suspend_deadline`.
struct WakeSignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl WakeSignal {
    fn new() -> Self {
        Self {
            state: Mutex::new(SignalState {
                terminate: false,
                suspended: false,
                suspend_deadline: None,
            }),
            condvar: Condvar::new(),
        }
    }

    fn request_terminate(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.terminate = true;
        self.condvar.notify_all();
    }

    fn is_terminate(&self) -> bool {
        self.state.lock().unwrap().terminate
    }

    fn is_suspended(&self) -> bool {
        self.state.lock().unwrap().suspended
    }

    fn suspend(&self, duration: Duration) {
        let mut guard = self.state.lock().unwrap();
        guard.suspended = true;
        guard.suspend_deadline = Some(Instant::now() + duration);
    }

    /// Called from the queue's "message available" callback so producer
    /// threads can wake the worker without touching its internals directly.
    fn notify(&self) {
        let _guard = self.state.lock().unwrap();
        self.condvar.notify_all();
    }

    /// Suspension point: wait until `suspend_deadline` elapses or an early
    /// terminate signal arrives.
    fn wait_suspended(&self) {
        let mut guard = self.state.lock().unwrap();
        loop {
            if guard.terminate {
                break;
            }
            let Some(deadline) = guard.suspend_deadline else {
                break;
            };
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, timeout) = self.condvar.wait_timeout(guard, deadline - now).unwrap();
            guard = next;
            if timeout.timed_out() {
                break;
            }
        }
        guard.suspended = false;
        guard.suspend_deadline = None;
    }

    /// Suspension point: block until a message becomes available or
    /// terminate is requested.
    fn wait_idle(&self, queue: &dyn Queue) {
        let mut guard = self.state.lock().unwrap();
        while !guard.terminate && queue.is_empty() {
            guard = self.condvar.wait(guard).unwrap();
        }
    }
}

/// Owns the database-facing state machine for one destination. Everything
/// here is touched by exactly one thread.
struct Worker {
    config: DestinationConfig,
    conn: ConnectionManager,
    reconciler: SchemaReconciler,
    txn: TxnState,
    queue: Arc<dyn Queue>,
    counters: Arc<DestinationCounters>,
    persist: Option<Arc<dyn PersistenceStore>>,
    signal: Arc<WakeSignal>,
    seq_num: u64,
    consecutive_failures: u32,
}

impl Worker {
    fn run(mut self) {
        loop {
            if self.signal.is_terminate() {
                self.drain_and_shutdown();
                return;
            }
            if self.signal.is_suspended() {
                self.signal.wait_suspended();
                continue;
            }
            if self.queue.is_empty() {
                if self.effective_flush_counter() > 0 {
                    if self.commit_batch().is_err() {
                        self.fault();
                    }
                } else {
                    self.signal.wait_idle(self.queue.as_ref());
                }
                continue;
            }
            if self.insert_one().is_err() {
                self.fault();
            }
        }
    }

    /// `flush_counter == -1` means transactions are disabled; that sentinel
    /// is represented implicitly via `config.transactions_disabled()` rather
    /// than as a stored field, since `TxnState` is shared verbatim with the
    /// schema reconciler's own DDL bracket (see `txn.rs`), where the
    /// sentinel never applies. Recorded in DESIGN.md.
    fn effective_flush_counter(&self) -> i64 {
        if self.config.transactions_disabled() {
            0
        } else {
            self.txn.flush_counter
        }
    }

    fn fault(&mut self) {
        self.conn.disconnect();
        self.reconciler.clear();
        self.signal.suspend(self.config.time_reopen);
    }

    /// `insert_one` sub-protocol.
    ///
    /// Once `pop_head` succeeds, the message must end up acknowledged,
    /// rewound, or dropped on every exit path — including the
    /// schema-reconcile and begin-transaction failures that precede the
    /// actual `query` call, which (unlike a row-level query failure) are
    /// connection/schema faults rather than row-specific, so the single
    /// message is rewound the same way a dead-ping failure rewinds it.
    fn insert_one(&mut self) -> Result<()> {
        self.conn.ensure_connected()?;

        let Some(msg) = self.queue.pop_head() else {
            return Ok(());
        };

        let mut table = msg.table.clone();
        match self
            .reconciler
            .ensure_table(&mut self.conn, self.queue.as_ref(), &mut self.txn, &mut table)
        {
            // `ensure_table` may have had to close out an already-open batch
            // before bracketing its own DDL; those entries are acknowledged
            // at the driver level already, so count them as stored here,
            // the same acknowledged-at-commit point every other path uses.
            Ok(acked) => self.record_acknowledged(acked),
            Err(err) => {
                self.rewind_single(msg);
                return Err(err);
            }
        }

        let transactions_enabled = !self.config.transactions_disabled();
        if transactions_enabled && self.txn.flush_counter == 0 {
            if let Err(err) = txn::begin(&mut self.conn, &mut self.txn) {
                self.rewind_single(msg);
                return Err(err);
            }
        }

        let Some(driver) = self.conn.driver() else {
            self.rewind_single(msg);
            return Err(DestinationError::NotConnected);
        };
        let sql = match statement::render_insert(driver, &self.config, &table, &msg.values) {
            Ok(sql) => sql,
            Err(err) => {
                // An arity mismatch reflects a host-side rendering bug, not
                // a transient condition: retrying reproduces the identical
                // mismatch every time, so this is dropped immediately
                // rather than rewound into an infinite retry loop.
                tracing::error!(table = %table, error = %err, "dropping unrenderable message");
                self.drop_message(&msg);
                return Ok(());
            }
        };

        match self.conn.run(&sql, false) {
            Ok(_) => self.handle_insert_success(transactions_enabled),
            Err(err) => self.handle_insert_failure(msg, transactions_enabled, err),
        }
    }

    /// `consecutive_failures` is per-message and resets on every successful
    /// query regardless of batching; `stored`/`seq_num` are not — they only
    /// advance once a message's INSERT is actually acknowledged (autocommit:
    /// immediately; batched: at the commit that covers it), so a message
    /// rewound by a mid-batch fault and replayed is counted exactly once
    /// (spec.md §8 property 5).
    fn handle_insert_success(&mut self, transactions_enabled: bool) -> Result<()> {
        if transactions_enabled {
            self.txn.flush_counter += 1;
            if self.txn.flush_counter >= self.config.flush_lines {
                self.commit_batch()?;
            }
        } else {
            if self.config.flags.explicit_commits {
                self.queue.ack_backlog(1);
            }
            self.record_acknowledged(1);
        }
        self.consecutive_failures = 0;
        Ok(())
    }

    /// On query failure, `ping` discriminates a row-level error (connection
    /// still alive) from a connection-level fault.
    fn handle_insert_failure(
        &mut self,
        msg: RenderedMessage,
        transactions_enabled: bool,
        err: DestinationError,
    ) -> Result<()> {
        if self.conn.ping() {
            self.consecutive_failures += 1;
            // With num_retries = 3, the same INSERT is retried exactly 3
            // times before dropping: the message is dropped once it has
            // failed `num_retries` times, not `num_retries - 1`. Recorded
            // as a DESIGN.md decision.
            if self.consecutive_failures >= self.config.num_retries {
                self.drop_message(&msg);
            } else {
                self.rewind_single(msg);
            }
            Ok(())
        } else {
            if transactions_enabled && self.txn.in_txn {
                if self.config.flags.explicit_commits {
                    self.queue.rewind_backlog_all();
                } else {
                    self.queue.push_head(msg);
                }
                self.txn.flush_counter = 0;
            } else {
                self.rewind_single(msg);
            }
            Err(err)
        }
    }

    fn rewind_single(&self, msg: RenderedMessage) {
        if self.config.flags.explicit_commits {
            self.queue.rewind_backlog(1);
        } else {
            self.queue.push_head(msg);
        }
    }

    fn drop_message(&mut self, msg: &RenderedMessage) {
        if self.config.flags.explicit_commits {
            self.queue.ack_backlog(1);
        }
        self.counters.record_dropped();
        tracing::error!(
            table = %msg.table,
            attempts = self.consecutive_failures,
            "dropping message after exhausting retries"
        );
        self.consecutive_failures = 0;
    }

    /// Commit the current batch and, on success, count every insert it
    /// covers as stored (`spec.md` §8 property 2: `ack_backlog` is called
    /// with exactly `flush_counter` at the moment of commit). Used by every
    /// path that closes a batch: the threshold flush in
    /// `handle_insert_success`, the quiet-period idle flush, and the
    /// shutdown drain.
    fn commit_batch(&mut self) -> Result<()> {
        let pending = u64::try_from(self.txn.flush_counter.max(0)).unwrap_or(0);
        txn::commit_or_rollback(&mut self.conn, self.queue.as_ref(), &mut self.txn)?;
        self.record_acknowledged(pending);
        Ok(())
    }

    /// Count `count` messages as stored and advance `seq_num` by the same
    /// amount. The sole place `stored`/`seq_num` move, so a message counted
    /// here has been acknowledged exactly once no matter how many times its
    /// INSERT was attempted.
    fn record_acknowledged(&mut self, count: u64) {
        if count == 0 {
            return;
        }
        self.counters.record_stored_n(count);
        self.seq_num += count;
        if let Some(store) = &self.persist {
            persist::store_sequence_number(store.as_ref(), &self.config, self.seq_num);
        }
    }

    /// Shutdown drain: keep inserting until the queue is
    /// empty; a failure mid-drain exits immediately without a final
    /// commit, leaving the backlog for the next start (decided in
    /// DESIGN.md). The connection is still closed either way: that is
    /// resource hygiene, not a data-semantics decision.
    fn drain_and_shutdown(&mut self) {
        let mut drained_cleanly = true;
        while !self.queue.is_empty() {
            if self.insert_one().is_err() {
                drained_cleanly = false;
                break;
            }
        }
        if drained_cleanly && self.effective_flush_counter() > 0 {
            let _ = self.commit_batch();
        }
        self.conn.disconnect();
        self.reconciler.clear();
    }
}

/// A running destination: owns the dedicated worker thread and the handles
/// the host interacts with.
pub struct Destination {
    signal: Arc<WakeSignal>,
    queue: Arc<dyn Queue>,
    counters: Arc<DestinationCounters>,
    handle: Option<JoinHandle<()>>,
}

impl Destination {
    /// Spawn the dedicated worker thread and register the queue's wake
    /// callback. `seq_num` is loaded from `persist` if given, keyed by the
    /// endpoint's stable identity tuple.
    pub fn start(
        config: DestinationConfig,
        factory: Arc<dyn DriverFactory>,
        queue: Arc<dyn Queue>,
        persist: Option<Arc<dyn PersistenceStore>>,
        counters: Arc<DestinationCounters>,
    ) -> Self {
        queue.set_use_backlog(config.flags.explicit_commits);

        let signal = Arc::new(WakeSignal::new());
        let callback_signal = Arc::clone(&signal);
        queue.check_items(Box::new(move || callback_signal.notify()));

        let seq_num = persist
            .as_ref()
            .map(|store| persist::load_sequence_number(store.as_ref(), &config))
            .unwrap_or(0);

        let worker = Worker {
            conn: ConnectionManager::new(factory, config.clone()),
            reconciler: SchemaReconciler::new(),
            txn: TxnState::default(),
            queue: Arc::clone(&queue),
            counters: Arc::clone(&counters),
            persist,
            config,
            signal: Arc::clone(&signal),
            seq_num,
            consecutive_failures: 0,
        };

        let handle = thread::Builder::new()
            .name("sql-destination-worker".into())
            .spawn(move || worker.run())
            .expect("spawning the destination worker thread");

        Self {
            signal,
            queue,
            counters,
            handle: Some(handle),
        }
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    pub fn counters(&self) -> &Arc<DestinationCounters> {
        &self.counters
    }

    /// Request cooperative shutdown and block until the worker has drained
    /// and disconnected.
    pub fn shutdown(mut self) {
        self.signal.request_terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Destination {
    fn drop(&mut self) {
        self.signal.request_terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
