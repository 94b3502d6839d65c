//! Fatal error taxonomy.
//!
//! Expected per-table results (match, mismatch, missing table) are
//! [`CheckOutcome`](crate::CheckOutcome) values, never errors. Everything here
//! aborts the whole run.

use crate::model::{Side, Table};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by [`Database`](crate::Database) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Logical database operation, used to label failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    ListSchemas,
    ListTables,
    LockTable,
    UnlockTables,
    ReadPosition,
    WaitForPosition,
    Checksum,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::ListSchemas => "list schemas",
            Operation::ListTables => "list tables",
            Operation::LockTable => "lock table",
            Operation::UnlockTables => "unlock tables",
            Operation::ReadPosition => "read the replication position",
            Operation::WaitForPosition => "wait for the replication position",
            Operation::Checksum => "checksum table",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum CheckError {
    /// A `--tables` / `--ignore-tables` pattern is not of the form `database.table`.
    #[error(
        "Invalid filter: {pattern}\nPlease use this format: database.table\nYou can use a wildcard * at any position."
    )]
    InvalidFilter { pattern: String },

    /// Any other invalid invocation, detected before contacting a server.
    #[error("{0}")]
    Usage(String),

    /// A connection to a server could not be established.
    #[error("cannot connect to {side} server {target}")]
    Connectivity {
        side: Side,
        target: String,
        #[source]
        source: BoxError,
    },

    /// A query failed on an established connection.
    #[error("{side} server failed to {operation}{}", on_table(.table))]
    Database {
        side: Side,
        operation: Operation,
        table: Option<Table>,
        #[source]
        source: BoxError,
    },

    /// The replica did not reach the captured primary position in time.
    #[error(
        "replica did not reach primary position {position} within {} seconds while checking {table}",
        .timeout.as_secs_f64()
    )]
    ReplicationTimeout {
        table: Table,
        position: String,
        timeout: Duration,
    },

    /// The replica reported it cannot wait at all (replication stopped or not configured).
    #[error(
        "replica cannot wait for primary position {position} while checking {table}: replication is not running"
    )]
    ReplicationNotRunning { table: Table, position: String },

    /// Shutdown was requested; honoured between tables while no lock is held.
    #[error("interrupted before checking {next}")]
    Interrupted { next: Table },
}

impl CheckError {
    /// True for errors raised before any server was contacted.
    pub fn is_usage(&self) -> bool {
        matches!(self, CheckError::InvalidFilter { .. } | CheckError::Usage(_))
    }

    /// True when replication itself is the problem rather than the connection.
    pub fn is_replication_failure(&self) -> bool {
        matches!(
            self,
            CheckError::ReplicationTimeout { .. } | CheckError::ReplicationNotRunning { .. }
        )
    }
}

fn on_table(table: &Option<Table>) -> String {
    match table {
        Some(table) => format!(" {table}"),
        None => String::new(),
    }
}

/// Wraps a backend error with the side and operation that produced it.
pub(crate) fn query_failed(
    side: Side,
    operation: Operation,
    table: Option<&Table>,
) -> impl FnOnce(BoxError) -> CheckError + '_ {
    move |source| CheckError::Database {
        side,
        operation,
        table: table.cloned(),
        source,
    }
}
