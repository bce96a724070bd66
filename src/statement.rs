//! Statement builder: renders `INSERT`, `CREATE TABLE`, `ALTER TABLE`,
//! `CREATE INDEX`, and transaction-boundary SQL strings.

use crate::config::{DestinationConfig, FieldConfig};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::{DestinationError, Result};
use crate::ident::index_name;

/// Render one field's value: `NULL` if it equals the configured
/// `null_sentinel`, otherwise the driver's quoted literal (or `''` if
/// quoting fails).
fn render_value(driver: &dyn Driver, value: &str, null_sentinel: Option<&str>) -> String {
    if null_sentinel.is_some_and(|sentinel| sentinel == value) {
        return "NULL".to_string();
    }
    driver.quote_string(value).unwrap_or_else(|_| "''".to_string())
}

/// Render the `INSERT` statement for one message.
///
/// `values` must have exactly as many entries as `config.fields` has
/// non-`DEFAULT_FLAG` entries; a mismatch is rejected rather than silently
/// truncated, since a short `values` slice would otherwise render a
/// statement with fewer columns than the host intended.
pub fn render_insert(driver: &dyn Driver, config: &DestinationConfig, table: &str, values: &[String]) -> Result<String> {
    let templated_count = config.fields.iter().filter(|f| !f.is_default()).count();
    if values.len() != templated_count {
        return Err(DestinationError::ArityMismatch {
            columns: templated_count,
            values: values.len(),
        });
    }

    let mut columns = Vec::with_capacity(config.fields.len());
    let mut rendered_values = Vec::with_capacity(config.fields.len());

    let mut value_iter = values.iter();
    for field in &config.fields {
        if field.is_default() {
            continue;
        }
        let value = value_iter.next().expect("length checked above");
        columns.push(field.name.clone());
        rendered_values.push(render_value(driver, value, config.null_sentinel.as_deref()));
    }

    Ok(format!(
        "INSERT INTO {table} ({cols}) VALUES ({vals})",
        cols = columns.join(", "),
        vals = rendered_values.join(", ")
    ))
}

/// Render `CREATE TABLE {t} ({name1} {type1}, ...)` in declared field order.
pub fn render_create_table(config: &DestinationConfig, table: &str) -> String {
    let columns: Vec<String> = config
        .fields
        .iter()
        .map(|f| format!("{} {}", f.name, f.sql_type))
        .collect();
    format!("CREATE TABLE {table} ({})", columns.join(", "))
}

/// Render `ALTER TABLE {t} ADD {name} {type}` for one missing column.
pub fn render_alter_table(table: &str, field: &FieldConfig) -> String {
    format!("ALTER TABLE {table} ADD {} {}", field.name, field.sql_type)
}

/// Render a `CREATE INDEX` statement for `column` on `table`, naming the
/// index with the length-sensitive hashed name on Oracle.
pub fn render_create_index(dialect: &Dialect, table: &str, column: &str) -> String {
    let name = index_name(dialect, table, column);
    format!("CREATE INDEX {name} ON {table} ({column})")
}

/// Render the transaction-begin statement, or `None` for dialects where
/// `BEGIN` is implicit (Oracle).
pub fn render_begin(dialect: &Dialect) -> Option<&'static str> {
    dialect.begin_literal()
}

pub const COMMIT: &str = "COMMIT";
pub const ROLLBACK: &str = "ROLLBACK";

/// The existence probe used by the schema reconciler.
pub fn render_probe(table: &str) -> String {
    format!("SELECT * FROM {table} WHERE 0=1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, Flags, PortValue};
    use crate::driver::fake::{FakeDriver, FakeDriverHandle};
    use std::time::Duration;

    fn driver() -> FakeDriver {
        FakeDriver::new(&FakeDriverHandle::new())
    }

    fn config(fields: Vec<FieldConfig>, null_sentinel: Option<&str>) -> DestinationConfig {
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
            vec![],
            null_sentinel.map(str::to_string),
            Flags::default(),
            -1,
            3,
            Duration::from_secs(10),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn insert_skips_default_fields_with_no_trailing_comma() {
        let cfg = config(
            vec![
                FieldConfig::templated("msg", "TEXT"),
                FieldConfig::defaulted("id", "INTEGER"),
                FieldConfig::templated("host", "TEXT"),
            ],
            None,
        );
        let sql = render_insert(&driver(), &cfg, "messages", &["hello".into(), "srv1".into()]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO messages (msg, host) VALUES ('hello', 'srv1')"
        );
    }

    #[test]
    fn null_sentinel_emits_unquoted_null() {
        let cfg = config(vec![FieldConfig::templated("msg", "TEXT")], Some("-"));
        let sql = render_insert(&driver(), &cfg, "messages", &["-".into()]).unwrap();
        assert_eq!(sql, "INSERT INTO messages (msg) VALUES (NULL)");
    }

    #[test]
    fn non_sentinel_value_is_quoted() {
        let cfg = config(vec![FieldConfig::templated("msg", "TEXT")], Some("-"));
        let sql = render_insert(&driver(), &cfg, "messages", &["hello".into()]).unwrap();
        assert_eq!(sql, "INSERT INTO messages (msg) VALUES ('hello')");
    }

    #[test]
    fn create_table_lists_all_declared_fields_in_order() {
        let cfg = config(
            vec![
                FieldConfig::templated("msg", "TEXT"),
                FieldConfig::templated("host", "TEXT"),
            ],
            None,
        );
        let sql = render_create_table(&cfg, "messages");
        assert_eq!(sql, "CREATE TABLE messages (msg TEXT, host TEXT)");
    }

    #[test]
    fn alter_table_adds_one_column() {
        let field = FieldConfig::templated("extra", "TEXT");
        assert_eq!(
            render_alter_table("messages", &field),
            "ALTER TABLE messages ADD extra TEXT"
        );
    }

    #[test]
    fn create_index_uses_short_name_for_non_oracle() {
        assert_eq!(
            render_create_index(&Dialect::Mysql, "messages", "host"),
            "CREATE INDEX messages_host_idx ON messages (host)"
        );
    }

    #[test]
    fn create_index_uses_hashed_name_for_long_oracle_identifiers() {
        let sql = render_create_index(&Dialect::Oracle, "a_very_long_table_name", "a_very_long_column_name");
        assert!(sql.starts_with("CREATE INDEX i"));
    }

    #[test]
    fn begin_literal_absent_for_oracle() {
        assert_eq!(render_begin(&Dialect::Oracle), None);
    }

    #[test]
    fn arity_mismatch_is_rejected_not_truncated() {
        let cfg = config(
            vec![
                FieldConfig::templated("msg", "TEXT"),
                FieldConfig::templated("host", "TEXT"),
            ],
            None,
        );
        let result = render_insert(&driver(), &cfg, "messages", &["hello".into()]);
        assert!(matches!(result, Err(DestinationError::ArityMismatch { columns: 2, values: 1 })));
    }
}
