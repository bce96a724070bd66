//! Connection manager: opens/closes the driver handle, runs session-init
//! statements, reports errors, pings liveness.

use std::sync::Arc;

use crate::config::{DestinationConfig, PortValue};
use crate::driver::{Driver, DriverFactory, DriverOption, QueryResult, global_init};
use crate::error::{DestinationError, EndpointContext, Result};

pub struct ConnectionManager {
    factory: Arc<dyn DriverFactory>,
    config: DestinationConfig,
    conn: Option<Box<dyn Driver>>,
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn DriverFactory>, config: DestinationConfig) -> Self {
        Self {
            factory,
            config,
            conn: None,
        }
    }

    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Borrow the live driver, for statement rendering that needs
    /// `quote_string`. `None` if not connected.
    pub fn driver(&self) -> Option<&dyn Driver> {
        self.conn.as_deref()
    }

    fn endpoint_context(&self) -> EndpointContext {
        EndpointContext {
            dialect: self.config.dialect.as_str().to_string(),
            host: self.config.endpoint.host.clone(),
            port: self.config.endpoint.port.as_text(),
            user: self.config.endpoint.user.clone(),
            database: self.config.endpoint.database.clone(),
        }
    }

    /// Ensure a live, session-initialized connection exists. A no-op if
    /// already connected.
    pub fn ensure_connected(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }

        global_init();

        let mut driver = self.factory.create(&self.config.dialect).map_err(|source| {
            DestinationError::Connect {
                endpoint: self.endpoint_context(),
                source,
            }
        })?;

        driver.set_option(DriverOption::Host, &self.config.endpoint.host);
        match &self.config.endpoint.port {
            PortValue::Numeric(n) => driver.set_option_numeric(DriverOption::Port, i64::from(*n)),
            PortValue::Text(s) => driver.set_option(DriverOption::Port, s),
        }
        driver.set_option(DriverOption::Username, &self.config.endpoint.user);
        driver.set_option(DriverOption::Password, &self.config.endpoint.password);
        driver.set_option(DriverOption::DbName, &self.config.endpoint.database);
        if let Some(encoding) = &self.config.endpoint.encoding {
            driver.set_option(DriverOption::Encoding, encoding);
        }
        let auto_commit = if self.config.flags.explicit_commits { "false" } else { "true" };
        driver.set_option(DriverOption::AutoCommit, auto_commit);

        if let Err(source) = driver.connect() {
            let endpoint = self.endpoint_context();
            tracing::error!(
                dialect = %endpoint.dialect,
                host = %endpoint.host,
                port = %endpoint.port,
                database = %endpoint.database,
                error = %source,
                "connection failed"
            );
            return Err(DestinationError::Connect { endpoint, source });
        }

        for statement in self.config.session_statements.clone() {
            if let Err(source) = driver.query(&statement) {
                let endpoint = self.endpoint_context();
                tracing::error!(
                    dialect = %endpoint.dialect,
                    host = %endpoint.host,
                    error = %source,
                    query = %statement,
                    "session statement failed"
                );
                driver.close();
                return Err(DestinationError::SessionStatement { endpoint, source });
            }
        }

        self.conn = Some(driver);
        Ok(())
    }

    /// Close the connection and drop it. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut driver) = self.conn.take() {
            driver.close();
        }
    }

    /// Liveness probe, used only after a query failure.
    pub fn ping(&mut self) -> bool {
        self.conn.as_mut().is_some_and(|driver| driver.ping())
    }

    /// Submit one SQL statement. Errors are logged with full context unless
    /// `silent` (used for the schema existence probe).
    pub fn run(&mut self, query: &str, silent: bool) -> Result<Option<Box<dyn QueryResult>>> {
        let Some(driver) = self.conn.as_mut() else {
            return Err(DestinationError::NotConnected);
        };
        match driver.query(query) {
            Ok(result) => Ok(result),
            Err(source) => {
                if !silent {
                    let endpoint = self.endpoint_context();
                    tracing::error!(
                        dialect = %endpoint.dialect,
                        host = %endpoint.host,
                        port = %endpoint.port,
                        database = %endpoint.database,
                        error = %source,
                        query = %query,
                        "query failed"
                    );
                }
                Err(DestinationError::Query {
                    endpoint: self.endpoint_context(),
                    query: query.to_string(),
                    source,
                })
            }
        }
    }
}
