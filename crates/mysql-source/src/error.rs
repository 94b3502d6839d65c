//! Error types for the MySQL backend.

use thiserror::Error;

/// Errors raised by the MySQL backend beyond plain driver failures.
#[derive(Error, Debug)]
pub enum MySQLError {
    /// MySQL connection or query error.
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    /// The primary returned no master status row.
    #[error("binary logging is disabled on this server")]
    BinlogDisabled,

    /// A result row did not have the expected shape.
    #[error("unexpected result from {query}: {detail}")]
    UnexpectedResult { query: &'static str, detail: String },

    /// `CHECKSUM TABLE` returned NULL, which happens when the table no longer exists.
    #[error("server returned no checksum for {0}")]
    NoChecksum(String),

    /// `SELECT VERSION()` returned something that is not a version string.
    #[error("cannot parse server version {0:?}")]
    UnknownVersion(String),
}
