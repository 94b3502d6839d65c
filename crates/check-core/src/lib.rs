//! Replication consistency checking
//!
//! Verifies that a primary server and its replica hold identical data for a
//! set of tables. For every table the primary is read-locked, its replication
//! position and checksum are captured, the replica is made to catch up to that
//! exact position, and the replica checksum is taken under its own read lock.
//!
//! The engine is reached only through the [`Database`] trait; see the
//! `replication-check-mysql` crate for the MySQL implementation.
//!
//! # Flow
//!
//! 1. [`read_catalog`] lists checkable tables on the primary.
//! 2. [`TableSelector`] applies the `--tables` / `--ignore-tables` filters.
//! 3. [`ConsistencyChecker`] runs the lock/position/checksum/wait/unlock
//!    sequence for each table, one table at a time.
//! 4. The resulting [`RunSummary`] carries outcomes and lock timings.
//!
//! [`run_check`] wires these steps together.

pub mod catalog;
pub mod checker;
pub mod database;
pub mod error;
pub mod filter;
pub mod model;
pub mod outcome;
pub mod reporter;
pub mod run;
pub mod summary;
pub mod testing;

pub use catalog::{is_internal_schema, read_catalog, Catalog, INTERNAL_SCHEMAS};
pub use checker::{ConsistencyChecker, DEFAULT_WAIT_TIMEOUT};
pub use database::{CatalogEntry, Database, TableKind, WaitStatus};
pub use error::{BoxError, CheckError, Operation};
pub use filter::{TableFilter, TablePattern, TableSelector};
pub use model::{Checksum, Server, Side, Table};
pub use outcome::{CheckOutcome, LockSpan, TableCheck};
pub use reporter::{NullReporter, Reporter, Step};
pub use run::{run_check, EmptyWorkListPolicy, RunOptions, RunOutcome};
pub use summary::{LockStats, RunSummary, SummaryBuilder};
