//! Schema reconciler: on first contact with each target table, create it
//! or alter it in place to add missing columns and indexes.

use std::collections::HashSet;

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::ident::sanitize_table_name;
use crate::queue::Queue;
use crate::statement::{render_alter_table, render_create_index, render_create_table, render_probe};
use crate::txn::{self, TxnState};

/// Tracks which tables have already been reconciled this connection.
/// Cleared on every disconnect, so a reconnect always re-probes.
#[derive(Debug, Default)]
pub struct SchemaReconciler {
    validated_tables: HashSet<String>,
}

impl SchemaReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.validated_tables.clear();
    }

    pub fn is_validated(&self, table: &str) -> bool {
        self.validated_tables.contains(table)
    }

    /// Ensure `table` (sanitized in place) exists with the declared column
    /// set, creating or altering it as needed.
    ///
    /// Returns the number of backlog entries acknowledged by closing out an
    /// already-open data-path transaction before this call's own DDL bracket
    /// (zero in the common case where no such transaction was open, or no
    /// DDL bracket was needed at all). The caller must count those entries
    /// as stored/acknowledged itself, since this module has no access to the
    /// worker's counters or `seq_num`.
    pub fn ensure_table(
        &mut self,
        conn: &mut ConnectionManager,
        queue: &dyn Queue,
        txn: &mut TxnState,
        table: &mut String,
    ) -> Result<u64> {
        if conn.config().flags.dont_create_tables {
            return Ok(0);
        }

        sanitize_table_name(table);

        if self.validated_tables.contains(table) {
            return Ok(0);
        }

        // Transactions disabled means every statement already autocommits at
        // the driver level, and the data path never opens a batch to
        // protect from DDL in the first place — so there is nothing to
        // bracket. Bracketing only matters when transactions are enabled,
        // and only for the tables that actually need DDL: a table already
        // present with every declared column needs no bracket either, which
        // keeps first-contact reconciliation on an already-correct table
        // from emitting a spurious BEGIN/COMMIT pair (spec.md §8 scenario 1).
        let transactional = !conn.config().transactions_disabled();
        let mut acked = 0u64;

        let probe = render_probe(table);
        match conn.run(&probe, true) {
            Ok(result) => {
                let fields = conn.config().fields.clone();
                let missing: Vec<_> = fields
                    .into_iter()
                    .filter(|f| !result.as_ref().is_some_and(|r| r.field_index(&f.name).is_some()))
                    .collect();
                if !missing.is_empty() {
                    if transactional {
                        acked = self.open_ddl_bracket(conn, queue, txn)?;
                    }
                    let dialect = conn.config().dialect.clone();
                    let indexes = conn.config().indexes.clone();
                    for field in &missing {
                        let alter = render_alter_table(table, field);
                        conn.run(&alter, false)?;
                        if indexes.iter().any(|idx| idx == &field.name) {
                            let create_index = render_create_index(&dialect, table, &field.name);
                            conn.run(&create_index, false)?;
                        }
                    }
                    if transactional {
                        txn::commit_or_rollback(conn, queue, txn)?;
                    }
                }
            }
            Err(_) => {
                if transactional {
                    acked = self.open_ddl_bracket(conn, queue, txn)?;
                }
                let create = render_create_table(conn.config(), table);
                conn.run(&create, false)?;
                let dialect = conn.config().dialect.clone();
                for column in conn.config().indexes.clone() {
                    let create_index = render_create_index(&dialect, table, &column);
                    conn.run(&create_index, false)?;
                }
                if transactional {
                    txn::commit_or_rollback(conn, queue, txn)?;
                }
            }
        }

        self.validated_tables.insert(table.clone());
        Ok(acked)
    }

    /// Close out any open data-path transaction before starting our own DDL
    /// bracket, so DDL never shares a transaction with DML. Returns the
    /// number of entries the closing commit acknowledged (0 if none was
    /// open).
    fn open_ddl_bracket(&self, conn: &mut ConnectionManager, queue: &dyn Queue, txn: &mut TxnState) -> Result<u64> {
        let pending = u64::try_from(txn.flush_counter.max(0)).unwrap_or(0);
        txn::commit_or_rollback(conn, queue, txn)?;
        txn::begin(conn, txn)?;
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DestinationConfig, EndpointConfig, FieldConfig, Flags, PortValue};
    use crate::dialect::Dialect;
    use crate::driver::fake::{FakeDriverFactory, FakeDriverHandle};
    use crate::queue::memory::InMemoryQueue;
    use std::sync::Arc;
    use std::time::Duration;

    fn config(fields: Vec<FieldConfig>, indexes: Vec<&str>) -> DestinationConfig {
        DestinationConfig::new(
            Dialect::Mysql,
            EndpointConfig {
                host: "h".into(),
                port: PortValue::Numeric(3306),
                user: "u".into(),
                password: "p".into(),
                database: "d".into(),
                encoding: None,
            },
            "messages",
            fields,
            indexes.into_iter().map(str::to_string).collect(),
            None,
            Flags::default(),
            -1,
            3,
            Duration::from_secs(10),
            vec![],
        )
        .unwrap()
    }

    fn setup(config: DestinationConfig) -> (ConnectionManager, FakeDriverHandle) {
        let handle = FakeDriverHandle::new();
        let factory = Arc::new(FakeDriverFactory::new(handle.clone()));
        let mut conn = ConnectionManager::new(factory, config);
        conn.ensure_connected().unwrap();
        (conn, handle)
    }

    #[test]
    fn creates_table_when_missing_and_caches_validation() {
        let cfg = config(vec![FieldConfig::templated("msg", "TEXT")], vec![]);
        let (mut conn, handle) = setup(cfg);
        let queue = InMemoryQueue::new();
        let mut txn = TxnState::default();
        let mut reconciler = SchemaReconciler::new();

        let mut table = "messages".to_string();
        reconciler.ensure_table(&mut conn, &queue, &mut txn, &mut table).unwrap();

        assert!(handle.command_count_matching("CREATE TABLE messages") == 1);
        assert!(reconciler.is_validated("messages"));
        assert!(!txn.in_txn);

        // A second call issues no further DDL.
        let mut table2 = "messages".to_string();
        reconciler.ensure_table(&mut conn, &queue, &mut txn, &mut table2).unwrap();
        assert_eq!(handle.command_count_matching("CREATE TABLE"), 1);
    }

    #[test]
    fn alters_table_for_missing_column() {
        let cfg = config(
            vec![
                FieldConfig::templated("msg", "TEXT"),
                FieldConfig::templated("extra", "TEXT"),
            ],
            vec!["extra"],
        );
        let (mut conn, handle) = setup(cfg);
        handle.set_table_exists("messages", &["msg"]);
        let queue = InMemoryQueue::new();
        let mut txn = TxnState::default();
        let mut reconciler = SchemaReconciler::new();

        let mut table = "messages".to_string();
        reconciler.ensure_table(&mut conn, &queue, &mut txn, &mut table).unwrap();

        assert_eq!(handle.command_count_matching("ALTER TABLE messages ADD extra"), 1);
        assert_eq!(handle.command_count_matching("CREATE INDEX"), 1);
        assert!(reconciler.is_validated("messages"));
    }

    #[test]
    fn dont_create_tables_flag_skips_reconciliation() {
        let mut cfg = config(vec![FieldConfig::templated("msg", "TEXT")], vec![]);
        cfg.flags.dont_create_tables = true;
        let (mut conn, handle) = setup(cfg);
        let queue = InMemoryQueue::new();
        let mut txn = TxnState::default();
        let mut reconciler = SchemaReconciler::new();

        let mut table = "messages".to_string();
        reconciler.ensure_table(&mut conn, &queue, &mut txn, &mut table).unwrap();
        assert_eq!(handle.commands().len(), 0);
        assert!(!reconciler.is_validated("messages"));
    }

    #[test]
    fn oracle_long_index_name_matches_shape() {
        let cfg_fields = vec![FieldConfig::templated(
            "a_very_long_column_name_here",
            "VARCHAR2(200)",
        )];
        let mut cfg = config(cfg_fields, vec!["a_very_long_column_name_here"]);
        cfg.dialect = Dialect::Oracle;
        let (mut conn, handle) = setup(cfg);
        let queue = InMemoryQueue::new();
        let mut txn = TxnState::default();
        let mut reconciler = SchemaReconciler::new();

        let mut table = "a_very_long_table_name_here".to_string();
        reconciler.ensure_table(&mut conn, &queue, &mut txn, &mut table).unwrap();

        let create_index = handle
            .commands()
            .into_iter()
            .find(|c| c.starts_with("CREATE INDEX"))
            .expect("index created");
        let name = create_index
            .strip_prefix("CREATE INDEX ")
            .unwrap()
            .split(' ')
            .next()
            .unwrap();
        assert_eq!(name.len(), 30);
        assert!(name.starts_with('i'));
    }
}
