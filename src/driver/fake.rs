//! An in-memory, scriptable [`Driver`] used by the integration test suite
//! to assert on exact emitted SQL and to simulate connection loss and
//! row-level errors without a real database.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::dialect::Dialect;
use crate::error::DriverError;

use super::{Driver, DriverFactory, DriverOption, QueryResult};

/// What a scripted query match should do.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Succeed normally.
    Ok,
    /// Fail the query; a subsequent `ping` still reports alive (row-level
    /// error).
    RowError(String),
    /// Fail the query; a subsequent `ping` reports dead until the next
    /// successful connect (connection-level fault).
    ConnectionLost(String),
}

#[derive(Debug)]
struct FakeQueryResult {
    columns: Vec<String>,
}

impl QueryResult for FakeQueryResult {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

type Matcher = Box<dyn Fn(&str) -> bool + Send>;

struct Shared {
    connected: bool,
    alive: bool,
    commands: Vec<String>,
    tables: HashMap<String, Vec<String>>,
    scripts: VecDeque<(Matcher, ScriptedOutcome)>,
    connect_should_fail: bool,
}

impl Shared {
    fn new() -> Self {
        Self {
            connected: false,
            alive: true,
            commands: Vec::new(),
            tables: HashMap::new(),
            scripts: VecDeque::new(),
            connect_should_fail: false,
        }
    }
}

/// A cloneable handle a test keeps to script and inspect a [`FakeDriver`]
/// across however many times the worker reconnects over its lifetime.
#[derive(Clone)]
pub struct FakeDriverHandle(Arc<Mutex<Shared>>);

impl FakeDriverHandle {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Shared::new())))
    }

    /// Register that `table` already exists with the given columns, so the
    /// schema reconciler's existence probe succeeds.
    pub fn set_table_exists(&self, table: &str, columns: &[&str]) {
        self.0.lock().unwrap().tables.insert(
            table.to_string(),
            columns.iter().map(|c| (*c).to_string()).collect(),
        );
    }

    /// Queue an outcome for the next query whose SQL text contains
    /// `substring`. Consumed in FIFO order across all queued scripts.
    pub fn queue_outcome_containing(&self, substring: impl Into<String>, outcome: ScriptedOutcome) {
        let needle = substring.into();
        self.0
            .lock()
            .unwrap()
            .scripts
            .push_back((Box::new(move |sql: &str| sql.contains(&needle)), outcome));
    }

    pub fn set_connect_should_fail(&self, fail: bool) {
        self.0.lock().unwrap().connect_should_fail = fail;
    }

    /// Snapshot of every statement submitted via [`Driver::query`], in order.
    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap().commands.clone()
    }

    pub fn command_count_matching(&self, substring: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.contains(substring))
            .count()
    }
}

impl Default for FakeDriverHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// The [`Driver`] implementation backed by a [`FakeDriverHandle`].
pub struct FakeDriver {
    shared: Arc<Mutex<Shared>>,
}

impl FakeDriver {
    pub fn new(handle: &FakeDriverHandle) -> Self {
        Self {
            shared: Arc::clone(&handle.0),
        }
    }
}

impl Driver for FakeDriver {
    fn set_option(&mut self, _option: DriverOption, _value: &str) {}

    fn set_option_numeric(&mut self, _option: DriverOption, _value: i64) {}

    fn connect(&mut self) -> Result<(), DriverError> {
        let mut shared = self.shared.lock().unwrap();
        if shared.connect_should_fail {
            return Err(DriverError::from("simulated connect failure"));
        }
        shared.connected = true;
        shared.alive = true;
        Ok(())
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn query(&mut self, sql: &str) -> Result<Option<Box<dyn QueryResult>>, DriverError> {
        let mut shared = self.shared.lock().unwrap();
        shared.commands.push(sql.to_string());

        let outcome = take_matching_script(&mut shared.scripts, sql);
        match outcome {
            Some(ScriptedOutcome::Ok) | None => default_outcome(&mut shared, sql),
            Some(ScriptedOutcome::RowError(msg)) => Err(DriverError::from(msg)),
            Some(ScriptedOutcome::ConnectionLost(msg)) => {
                shared.alive = false;
                Err(DriverError::from(msg))
            }
        }
    }

    fn quote_string(&self, value: &str) -> Result<String, DriverError> {
        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    fn ping(&mut self) -> bool {
        self.shared.lock().unwrap().alive
    }

    fn close(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        shared.connected = false;
    }
}

fn take_matching_script(scripts: &mut VecDeque<(Matcher, ScriptedOutcome)>, sql: &str) -> Option<ScriptedOutcome> {
    let index = scripts.iter().position(|(matcher, _)| matcher(sql))?;
    scripts.remove(index).map(|(_, outcome)| outcome)
}

fn default_outcome(shared: &mut Shared, sql: &str) -> Result<Option<Box<dyn QueryResult>>, DriverError> {
    let upper = sql.trim_start().to_ascii_uppercase();
    if upper.starts_with("SELECT") {
        if let Some(table) = extract_probed_table(sql) {
            if let Some(columns) = shared.tables.get(&table) {
                return Ok(Some(Box::new(FakeQueryResult {
                    columns: columns.clone(),
                })));
            }
            return Err(DriverError::from(format!("no such table: {table}")));
        }
    }
    Ok(None)
}

/// Best-effort extraction of the table name from the existence probe
/// `SELECT * FROM {t} WHERE 0=1`.
fn extract_probed_table(sql: &str) -> Option<String> {
    let from_idx = sql.to_ascii_uppercase().find("FROM")?;
    let rest = sql[from_idx + 4..].trim_start();
    let table: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    if table.is_empty() { None } else { Some(table) }
}

/// A [`DriverFactory`] that always hands out a [`FakeDriver`] wired to the
/// same shared state, so reconnects preserve scripted behavior.
pub struct FakeDriverFactory {
    handle: FakeDriverHandle,
}

impl FakeDriverFactory {
    pub fn new(handle: FakeDriverHandle) -> Self {
        Self { handle }
    }
}

impl DriverFactory for FakeDriverFactory {
    fn create(&self, _dialect: &Dialect) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(FakeDriver::new(&self.handle)))
    }
}
