//! MySQL and MariaDB backend for the replication consistency checker
//!
//! Implements [`replication_check_core::Database`] over one dedicated
//! `mysql_async` session per server. The statements used for reading the
//! binary log position and waiting on the replica are chosen from the server
//! version at connect time.

mod client;
mod database;
mod dialect;
mod error;
mod position;
pub mod testing;

pub use client::{connect, connection_opts};
pub use database::{qualified_name, quote_identifier, wait_status, MySQLDatabase};
pub use dialect::{Dialect, Flavor, ServerVersion};
pub use error::MySQLError;
pub use position::BinlogPosition;
