//! The database-driver plugin contract.
//!
//! The concrete multi-vendor client stack (mysql/pgsql/oracle/freetds
//! drivers) is explicitly out of scope; this trait is what a production
//! deployment plugs a real client library into. The crate ships one
//! concrete implementation, [`sqlite::RusqliteDriver`], for the one dialect
//! whose client library is idiomatic to vendor directly, plus
//! [`fake::FakeDriver`] used by the test suite to assert on exact emitted
//! SQL and simulate connection loss for the other dialects.

pub mod fake;
pub mod sqlite;

use std::sync::Once;

use crate::error::DriverError;

/// Options passed to [`Driver::set_option`]/[`Driver::set_option_numeric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOption {
    Host,
    Port,
    Username,
    Password,
    DbName,
    Encoding,
    AutoCommit,
}

/// A single row/column result set, as handed back by [`Driver::query`].
pub trait QueryResult: std::fmt::Debug {
    /// Index of `name` among the result's fields, or `None` if absent.
    /// Used by the schema reconciler to diff declared columns against the
    /// probe's actual column set.
    fn field_index(&self, name: &str) -> Option<usize>;
}

/// The driver plugin contract consumed by the connection manager.
pub trait Driver: Send {
    fn set_option(&mut self, option: DriverOption, value: &str);
    fn set_option_numeric(&mut self, option: DriverOption, value: i64);

    /// Open the connection. On failure, `last_error` should describe why.
    fn connect(&mut self) -> Result<(), DriverError>;

    /// Last error reported by the driver, if any.
    fn last_error(&self) -> Option<String>;

    /// Run one SQL statement. Returns `Ok(None)` for statements with no
    /// result set (DDL, DML, transaction control), `Ok(Some(_))` for
    /// queries that produce one, and `Err` on failure.
    fn query(&mut self, sql: &str) -> Result<Option<Box<dyn QueryResult>>, DriverError>;

    /// Quote a string literal for inclusion in SQL text.
    fn quote_string(&self, value: &str) -> Result<String, DriverError>;

    /// Liveness probe, used only after a query failure to discriminate
    /// transient connection loss from a row-level error.
    fn ping(&mut self) -> bool;

    /// Close the connection. Idempotent.
    fn close(&mut self);
}

/// A factory for constructing a fresh, unconnected driver instance for a
/// given dialect, in place of a runtime-loaded driver table keyed by
/// dialect name.
pub trait DriverFactory: Send + Sync {
    fn create(&self, dialect: &crate::dialect::Dialect) -> Result<Box<dyn Driver>, DriverError>;
}

static GLOBAL_INIT: Once = Once::new();

/// One-shot, process-wide driver-library initialization. Idempotent; safe
/// to call from every `ensure_connected`.
pub fn global_init() {
    GLOBAL_INIT.call_once(|| {
        tracing::debug!("driver library initialized");
    });
}
