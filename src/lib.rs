//! `sql_destination`: an SQL destination sink that persists a stream of
//! structured log records into a relational database by synthesizing
//! `INSERT` statements.
//!
//! This crate is embedded inside a larger log-routing host. It owns exactly
//! one connection per destination instance and runs it on a single
//! dedicated worker thread, decoupling blocking database I/O from the
//! host's message-intake path.
//!
//! # Architecture
//!
//! Five components compose the core, in dependency order leaves-first:
//!
//! - [`ident`] - SQL identifier sanitizer and Oracle index-name derivation
//! - [`dialect`] - the per-database dialect table (begin literal, port type)
//! - [`statement`] - renders `INSERT`/`CREATE TABLE`/`ALTER TABLE`/`CREATE INDEX`
//! - [`connection`] - opens/closes the driver handle, runs session statements
//! - [`schema`] - the schema reconciler (create-or-alter on first contact)
//! - [`txn`] - shared begin/commit/rollback helpers
//! - [`worker`] - the transaction/worker loop state machine and the public
//!   [`worker::Destination`] handle
//!
//! Supporting modules: [`config`] (destination configuration types),
//! [`driver`] (the database-driver plugin contract), [`queue`] (the durable
//! queue contract), [`message`] (the rendered-message shape), [`persist`]
//! (persisted-state key derivation), [`stats`] (per-destination counters),
//! [`error`] (the crate-wide error type), and [`logging`] (tracing setup).

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod ident;
pub mod logging;
pub mod message;
pub mod persist;
pub mod queue;
pub mod schema;
pub mod statement;
pub mod stats;
pub mod txn;
pub mod worker;

pub use config::{DestinationConfig, EndpointConfig, FieldConfig, Flags};
pub use dialect::Dialect;
pub use error::{DestinationError, Result};
pub use message::RenderedMessage;
pub use worker::Destination;
