//! Run-level aggregation of outcomes and lock timings.

use crate::outcome::{CheckOutcome, LockSpan, TableCheck};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Lock duration totals for one side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    pub count: u32,
    pub total: Duration,
    pub longest: Duration,
}

impl LockStats {
    pub fn record(&mut self, span: &LockSpan) {
        let duration = span.duration();
        self.count += 1;
        self.total += duration;
        self.longest = self.longest.max(duration);
    }
}

/// Accumulates table checks while a run is in progress.
#[derive(Debug)]
pub struct SummaryBuilder {
    started_at: DateTime<Utc>,
    started: Instant,
    outcomes: Vec<CheckOutcome>,
    primary_locks: LockStats,
    replica_locks: LockStats,
}

impl SummaryBuilder {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            outcomes: Vec::new(),
            primary_locks: LockStats::default(),
            replica_locks: LockStats::default(),
        }
    }

    pub fn record(&mut self, check: TableCheck) {
        if let Some(span) = &check.primary_lock {
            self.primary_locks.record(span);
        }
        if let Some(span) = &check.replica_lock {
            self.replica_locks.record(span);
        }
        self.outcomes.push(check.outcome);
    }

    pub fn finish(self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
            outcomes: self.outcomes,
            primary_locks: self.primary_locks,
            replica_locks: self.replica_locks,
        }
    }
}

/// Final result of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    started_at: DateTime<Utc>,
    elapsed: Duration,
    outcomes: Vec<CheckOutcome>,
    primary_locks: LockStats,
    replica_locks: LockStats,
}

impl RunSummary {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Outcomes in the order the tables were checked.
    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    pub fn primary_locks(&self) -> &LockStats {
        &self.primary_locks
    }

    pub fn replica_locks(&self) -> &LockStats {
        &self.replica_locks
    }

    pub fn table_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Every outcome other than a match.
    pub fn errors(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.is_match())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CheckOutcome::ChecksumMismatch { .. }))
    }

    pub fn missing(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CheckOutcome::MissingOnReplica { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::is_match)
    }
}
