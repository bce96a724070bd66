//! The message shape the worker consumes.
//!
//! Template compilation and evaluation are out of scope: the
//! host renders each field's `value_template` and the table-name template
//! before handing a message to this crate. `DEFAULT_FLAG` fields are
//! simply absent from `values`; the host is responsible for omitting them
//! when it builds the vector, matching `fields`'s declared order minus any
//! `DEFAULT_FLAG` entries.

/// One already-rendered log record, ready to be turned into an `INSERT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// The rendered target table name (local-time-zone template); sanitized
    /// by the schema reconciler before use.
    pub table: String,
    /// Rendered values, one per non-`DEFAULT_FLAG` field, in the same
    /// order as `DestinationConfig::fields` with `DEFAULT_FLAG` entries
    /// skipped.
    pub values: Vec<String>,
}

impl RenderedMessage {
    pub fn new(table: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            table: table.into(),
            values,
        }
    }
}
