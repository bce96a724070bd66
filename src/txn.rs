//! Shared transaction-boundary helpers used by both the schema reconciler
//! and the worker loop.
//!
//! Both callers mutate the same `TxnState`, which is why this lives in its
//! own module rather than being private to `worker`: the schema reconciler
//! must close any transaction the worker left open before opening its own
//! DDL bracket, and must leave the state clean
//! afterward so the worker's next `BEGIN` starts a genuinely fresh batch.

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::queue::Queue;
use crate::statement::{self, render_begin};

/// The subset of worker runtime state that transaction
/// boundaries touch.
#[derive(Debug, Default)]
pub struct TxnState {
    pub in_txn: bool,
    /// Number of successful inserts in the current open transaction; `0`
    /// when none is open. Transactions-disabled mode is represented at the
    /// `DestinationConfig` level (`flush_lines == -1`), not here, since
    /// this struct is also used for the schema reconciler's own bracket
    /// where the `-1` sentinel never applies.
    pub flush_counter: i64,
}

/// Open a transaction. Oracle has no explicit `BEGIN` (implicit after
/// `COMMIT`); `in_txn` is still set so the rest of the state machine treats
/// the batch as open.
pub fn begin(conn: &mut ConnectionManager, txn: &mut TxnState) -> Result<()> {
    if let Some(literal) = render_begin(&conn.config().dialect) {
        conn.run(literal, false)?;
    }
    txn.in_txn = true;
    Ok(())
}

/// Commit the open transaction, if any.
///
/// On success, exactly `flush_counter` backlog entries are acknowledged,
/// since that is the number of inserts this transaction actually covered.
///
/// On failure, the entire backlog is rewound so the batch can be retried,
/// and `flush_counter` is reset. `in_txn` is left as the driver left it.
/// Callers almost always want [`commit_or_rollback`] instead of calling
/// this directly.
pub fn commit(conn: &mut ConnectionManager, queue: &dyn Queue, txn: &mut TxnState) -> Result<()> {
    if !txn.in_txn {
        return Ok(());
    }
    match conn.run(statement::COMMIT, false) {
        Ok(_) => {
            let acked = usize::try_from(txn.flush_counter.max(0)).unwrap_or(usize::MAX);
            queue.ack_backlog(acked);
            txn.flush_counter = 0;
            txn.in_txn = false;
            Ok(())
        }
        Err(err) => {
            queue.rewind_backlog_all();
            txn.flush_counter = 0;
            Err(err)
        }
    }
}

/// Roll back the open transaction, if any.
pub fn rollback(conn: &mut ConnectionManager, txn: &mut TxnState) -> Result<()> {
    if !txn.in_txn {
        return Ok(());
    }
    txn.in_txn = false;
    conn.run(statement::ROLLBACK, false).map(|_| ())
}

/// Commit, and on failure attempt a rollback before propagating the
/// original commit error. The composite used everywhere a commit attempt
/// needs a rollback fallback: the quiet-period flush, the schema
/// reconciler's own bracket, and the shutdown drain.
pub fn commit_or_rollback(conn: &mut ConnectionManager, queue: &dyn Queue, txn: &mut TxnState) -> Result<()> {
    let result = commit(conn, queue, txn);
    if result.is_err() {
        let _ = rollback(conn, txn);
    }
    result
}
