//! Error types for the SQL destination sink.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DestinationError>;

/// Endpoint context attached to connection- and query-level errors so that
/// log events carry `{dialect, host, port, user, database}` as specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointContext {
    pub dialect: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub database: String,
}

impl fmt::Display for EndpointContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}@{}:{}/{}",
            self.dialect, self.user, self.host, self.port, self.database
        )
    }
}

/// Errors surfaced by the destination sink.
///
/// Initialization errors are fatal and returned to the host before the
/// worker starts. Runtime errors (connect, session statement, schema,
/// query, commit) are handled internally by the worker state machine
///; they are exposed here so the worker can log them with
/// full context before deciding how to recover.
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("field count mismatch: {columns} columns vs {values} values")]
    ArityMismatch { columns: usize, values: usize },

    #[error("num_retries must be >= 1, got {0}")]
    InvalidRetryCount(u32),

    #[error("flush_lines must be positive or -1, got {0}")]
    InvalidFlushLines(i64),

    #[error("flush_lines > 0 requires explicit_commits (batching rewinds depend on the backlog it enables)")]
    BatchingRequiresExplicitCommits,

    #[error("connect failed for {endpoint}: {source}")]
    Connect {
        endpoint: EndpointContext,
        #[source]
        source: DriverError,
    },

    #[error("session statement failed for {endpoint}: {source}")]
    SessionStatement {
        endpoint: EndpointContext,
        #[source]
        source: DriverError,
    },

    #[error("query failed for {endpoint}: {source} (query: {query})")]
    Query {
        endpoint: EndpointContext,
        query: String,
        #[source]
        source: DriverError,
    },

    #[error("no connection established")]
    NotConnected,
}

/// Opaque error returned by the `Driver` contract. The destination sink
/// never inspects driver-specific error kinds beyond their message; the
/// driver plugin layer is out of scope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DriverError(pub String);

impl From<String> for DriverError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DriverError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
