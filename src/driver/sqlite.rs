//! A concrete [`Driver`] for the `sqlite` dialect, backed by `rusqlite`.
//!
//! A single owned `rusqlite::Connection`, opened lazily, with no pooling:
//! exactly one connection per destination.

use std::path::PathBuf;

use rusqlite::Connection;

use crate::dialect::Dialect;
use crate::error::DriverError;

use super::{Driver, DriverFactory, DriverOption, QueryResult};

#[derive(Debug)]
struct SqliteQueryResult {
    columns: Vec<String>,
}

impl QueryResult for SqliteQueryResult {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Driver backed by a single `rusqlite::Connection` opened against a file
/// path (or `:memory:`).
pub struct RusqliteDriver {
    path: PathBuf,
    conn: Option<Connection>,
    last_error: Option<String>,
}

impl RusqliteDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            last_error: None,
        }
    }
}

impl Driver for RusqliteDriver {
    fn set_option(&mut self, _option: DriverOption, _value: &str) {
        // SQLite's single-file connection has no host/user/password options.
    }

    fn set_option_numeric(&mut self, _option: DriverOption, _value: i64) {}

    fn connect(&mut self) -> Result<(), DriverError> {
        match Connection::open(&self.path) {
            Ok(conn) => {
                self.conn = Some(conn);
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(DriverError::from(err.to_string()))
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn query(&mut self, sql: &str) -> Result<Option<Box<dyn QueryResult>>, DriverError> {
        let result = run_query(self.conn.as_ref(), sql);
        if let Err(err) = &result {
            self.last_error = Some(err.0.clone());
        }
        result
    }

    fn quote_string(&self, value: &str) -> Result<String, DriverError> {
        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    fn ping(&mut self) -> bool {
        match &self.conn {
            Some(conn) => conn.execute_batch("SELECT 1").is_ok(),
            None => false,
        }
    }

    fn close(&mut self) {
        self.conn = None;
    }
}

fn run_query(conn: Option<&Connection>, sql: &str) -> Result<Option<Box<dyn QueryResult>>, DriverError> {
    let conn = conn.ok_or_else(|| DriverError::from("not connected"))?;
    let mut stmt = conn.prepare(sql).map_err(|e| DriverError::from(e.to_string()))?;
    if stmt.column_count() == 0 {
        drop(stmt);
        conn.execute(sql, []).map_err(|e| DriverError::from(e.to_string()))?;
        return Ok(None);
    }
    let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
    stmt.query([]).map_err(|e| DriverError::from(e.to_string()))?;
    Ok(Some(Box::new(SqliteQueryResult { columns })))
}

/// Factory producing [`RusqliteDriver`]s rooted at a fixed file path.
pub struct RusqliteDriverFactory {
    path: PathBuf,
}

impl RusqliteDriverFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DriverFactory for RusqliteDriverFactory {
    fn create(&self, dialect: &Dialect) -> Result<Box<dyn Driver>, DriverError> {
        if !matches!(dialect, Dialect::Sqlite) {
            return Err(DriverError::from(format!(
                "RusqliteDriverFactory only serves the sqlite dialect, got {dialect}"
            )));
        }
        Ok(Box::new(RusqliteDriver::new(self.path.clone())))
    }
}
