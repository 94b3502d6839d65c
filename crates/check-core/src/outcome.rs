//! Per-table results.

use crate::model::{Checksum, Table};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Expected result of checking one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    Match {
        table: Table,
        checksum: Checksum,
    },
    ChecksumMismatch {
        table: Table,
        primary: Checksum,
        replica: Checksum,
    },
    MissingOnReplica {
        table: Table,
    },
}

impl CheckOutcome {
    pub fn table(&self) -> &Table {
        match self {
            CheckOutcome::Match { table, .. }
            | CheckOutcome::ChecksumMismatch { table, .. }
            | CheckOutcome::MissingOnReplica { table } => table,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, CheckOutcome::Match { .. })
    }
}

/// Interval during which one side held a table under a read lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSpan {
    started: Instant,
    ended: Instant,
}

impl LockSpan {
    pub fn new(started: Instant, ended: Instant) -> Self {
        Self { started, ended }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn ended(&self) -> Instant {
        self.ended
    }

    pub fn duration(&self) -> Duration {
        self.ended.saturating_duration_since(self.started)
    }
}

/// An outcome plus the lock spans it took to produce it.
///
/// Spans are `None` for tables missing on the replica, which are never locked.
#[derive(Clone, Debug)]
pub struct TableCheck {
    pub outcome: CheckOutcome,
    pub primary_lock: Option<LockSpan>,
    pub replica_lock: Option<LockSpan>,
}

impl TableCheck {
    pub fn missing(table: Table) -> Self {
        Self {
            outcome: CheckOutcome::MissingOnReplica { table },
            primary_lock: None,
            replica_lock: None,
        }
    }
}
