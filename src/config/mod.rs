//! Destination configuration types.
//!
//! The host is assumed to have already parsed its own configuration syntax;
//! this module defines the resolved, validated in-memory shape the rest of
//! the crate works with, and performs the init-time validation that shape
//! requires (invalid column identifiers, arity mismatches and bad
//! retry/flush values are all initialization-fatal).

use std::collections::HashMap;
use std::time::Duration;

use crate::dialect::Dialect;
use crate::error::{DestinationError, Result};
use crate::ident::validate_column_name;

/// A field's value source: either a pre-rendered template (evaluated by the
/// host) or the `DEFAULT_FLAG` sentinel meaning "let the database supply
/// its own default".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Contributes to the column list and, per message, to the values list.
    Template,
    /// Contributes to neither; the database's own column default applies.
    Default,
}

/// One declared destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConfig {
    pub name: String,
    pub sql_type: String,
    pub value: FieldValue,
}

impl FieldConfig {
    pub fn templated(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            value: FieldValue::Template,
        }
    }

    pub fn defaulted(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            value: FieldValue::Default,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self.value, FieldValue::Default)
    }
}

/// Port option value: numeric for dialects that require it, string
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortValue {
    Numeric(u32),
    Text(String),
}

impl PortValue {
    pub fn as_text(&self) -> String {
        match self {
            Self::Numeric(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: PortValue,
    pub user: String,
    pub password: String,
    pub database: String,
    pub encoding: Option<String>,
}

/// Destination-level behavior flags.
///
/// `use_backlog` on the queue is enabled iff `explicit_commits` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub explicit_commits: bool,
    pub dont_create_tables: bool,
}

impl Flags {
    /// Parse flags out of a host-supplied key/value side channel, warning
    /// and ignoring unrecognized keys rather than failing.
    pub fn from_raw(raw: &HashMap<String, String>) -> Self {
        let mut flags = Self::default();
        for (key, value) in raw {
            let enabled = parse_bool(value);
            match key.as_str() {
                "explicit-commits" | "explicit_commits" => flags.explicit_commits = enabled,
                "dont-create-tables" | "dont_create_tables" => flags.dont_create_tables = enabled,
                other => {
                    tracing::warn!(flag = other, "unknown destination flag ignored");
                }
            }
        }
        flags
    }
}

fn parse_bool(s: &str) -> bool {
    !matches!(s.to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

/// Immutable destination configuration.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub dialect: Dialect,
    pub endpoint: EndpointConfig,
    /// The raw table-name template string; used only for persistence-key
    /// derivation here (rendering happens host-side per message).
    pub table_template: String,
    pub fields: Vec<FieldConfig>,
    pub indexes: Vec<String>,
    pub null_sentinel: Option<String>,
    pub flags: Flags,
    pub flush_lines: i64,
    pub num_retries: u32,
    pub time_reopen: Duration,
    pub session_statements: Vec<String>,
}

impl DestinationConfig {
    /// Validate and construct a configuration. Invalid column names, a
    /// non-positive `num_retries`, a `flush_lines` outside `{-1} ∪
    /// ℤ+`, or batching (`flush_lines > 0`) without `explicit_commits` are
    /// initialization-fatal.
    pub fn new(
        dialect: Dialect,
        endpoint: EndpointConfig,
        table_template: impl Into<String>,
        fields: Vec<FieldConfig>,
        indexes: Vec<String>,
        null_sentinel: Option<String>,
        flags: Flags,
        flush_lines: i64,
        num_retries: u32,
        time_reopen: Duration,
        session_statements: Vec<String>,
    ) -> Result<Self> {
        for field in &fields {
            validate_column_name(&field.name)?;
        }
        if num_retries == 0 {
            return Err(DestinationError::InvalidRetryCount(num_retries));
        }
        if flush_lines != -1 && flush_lines <= 0 {
            return Err(DestinationError::InvalidFlushLines(flush_lines));
        }
        if flush_lines > 0 && !flags.explicit_commits {
            // A mid-batch rewind (spec.md §4.5 step 7, dead-ping branch) rewinds
            // "the entire backlog for the current batch", but the queue only
            // tracks a backlog while `explicit_commits` is on (spec.md §6). Without
            // it, a batched failure would silently drop every already-popped
            // message in the open transaction instead of replaying them.
            return Err(DestinationError::BatchingRequiresExplicitCommits);
        }

        Ok(Self {
            dialect,
            endpoint,
            table_template: table_template.into(),
            fields,
            indexes,
            null_sentinel,
            flags,
            flush_lines,
            num_retries,
            time_reopen,
            session_statements,
        })
    }

    /// Whether transactions are disabled entirely (autocommit mode).
    pub fn transactions_disabled(&self) -> bool {
        self.flush_lines == -1
    }

    /// The stable key tuple used for persisted state.
    pub fn persistence_key(&self) -> (String, String, String, String, String) {
        (
            self.dialect.as_str().to_string(),
            self.endpoint.host.clone(),
            self.endpoint.port.as_text(),
            self.endpoint.database.clone(),
            self.table_template.clone(),
        )
    }
}
