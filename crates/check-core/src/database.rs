//! The database boundary.
//!
//! This trait abstracts over engine differences so the check protocol can be
//! written once. Each implementation owns exactly one server session: read
//! locks are session-scoped, so a connection pool would silently break the
//! lock/unlock pairing.

use crate::error::BoxError;
use crate::model::{Checksum, Table};
use std::fmt;
use std::time::Duration;

/// Storage kind of a catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableKind {
    BaseTable,
    View,
    SystemView,
    Other(String),
}

impl TableKind {
    /// Maps an `information_schema`-style table type (`BASE TABLE`, `VIEW`, ...).
    pub fn from_table_type(table_type: &str) -> Self {
        match table_type.trim().to_ascii_uppercase().as_str() {
            "BASE TABLE" => TableKind::BaseTable,
            "VIEW" => TableKind::View,
            "SYSTEM VIEW" => TableKind::SystemView,
            _ => TableKind::Other(table_type.to_string()),
        }
    }

    /// Views have no storage of their own and are never checksummed.
    pub fn is_checkable(&self) -> bool {
        !matches!(self, TableKind::View | TableKind::SystemView)
    }
}

/// One table as listed by the server for a schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: TableKind,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Result of waiting for the replica to apply a primary position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    /// The replica applied the position (or was already past it).
    Reached,
    /// The bound elapsed before the replica got there.
    TimedOut,
    /// The replica cannot wait: replication is stopped or not configured.
    NotReplicating,
}

/// Operations the check protocol issues against one server.
///
/// `current_position` is only ever called on the primary and
/// `wait_for_position` only on the replica.
#[async_trait::async_trait]
pub trait Database: Send {
    /// Monotonic replication coordinate, opaque to the protocol.
    type Position: Clone + fmt::Debug + fmt::Display + Send + Sync;

    async fn list_schemas(&mut self) -> Result<Vec<String>, BoxError>;

    async fn list_tables(&mut self, schema: &str) -> Result<Vec<CatalogEntry>, BoxError>;

    /// Acquires a read lock on `table`, blocking writers until [`unlock_tables`](Self::unlock_tables).
    async fn lock_table_read(&mut self, table: &Table) -> Result<(), BoxError>;

    /// Releases every lock held by this session.
    async fn unlock_tables(&mut self) -> Result<(), BoxError>;

    async fn current_position(&mut self) -> Result<Self::Position, BoxError>;

    async fn wait_for_position(
        &mut self,
        position: &Self::Position,
        timeout: Duration,
    ) -> Result<WaitStatus, BoxError>;

    /// Deterministic, row-order independent checksum of the table contents.
    async fn checksum_table(&mut self, table: &Table) -> Result<Checksum, BoxError>;

    async fn disconnect(self) -> Result<(), BoxError>
    where
        Self: Sized;
}
