//! The per-table check protocol.
//!
//! For each table, strictly in this order:
//!
//! 1. skip (as missing) if the replica catalog does not contain it
//! 2. lock the table on the primary
//! 3. read the primary replication position
//! 4. checksum the primary
//! 5. wait until the replica has applied that position
//! 6. lock the table on the replica
//! 7. unlock the primary
//! 8. checksum the replica
//! 9. unlock the replica
//! 10. compare
//!
//! The primary lock is held from before the position read until after the
//! replica lock is taken, so the position and both checksums describe the
//! same committed state and there is no instant where neither side is frozen.
//! Tables are checked one at a time so at most one production table is locked.

use crate::catalog::Catalog;
use crate::database::{Database, WaitStatus};
use crate::error::{query_failed, CheckError, Operation};
use crate::model::{Side, Table};
use crate::outcome::{CheckOutcome, LockSpan, TableCheck};
use crate::reporter::{Reporter, Step};
use crate::summary::{RunSummary, SummaryBuilder};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

/// Default bound on the replica catch-up wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra client-side allowance on top of the server-side wait bound.
const WAIT_GUARD: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone, Copy)]
struct HeldLocks {
    primary: bool,
    replica: bool,
}

pub struct ConsistencyChecker<'a, P, R> {
    primary: &'a mut P,
    replica: &'a mut R,
    wait_timeout: Duration,
    shutdown: Option<broadcast::Receiver<()>>,
}

impl<'a, P, R> ConsistencyChecker<'a, P, R>
where
    P: Database,
    R: Database<Position = P::Position>,
{
    pub fn new(primary: &'a mut P, replica: &'a mut R) -> Self {
        Self {
            primary,
            replica,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            shutdown: None,
        }
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Stops the run before the next table once a value is received.
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Checks every table in `work`, in order.
    ///
    /// `replica_catalog` is the replica's table list, read once for the whole run.
    /// The first fatal error aborts the run; no outcome is recorded for the
    /// table that was in progress.
    pub async fn run(
        &mut self,
        work: &[Table],
        replica_catalog: &Catalog,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary, CheckError> {
        let mut summary = SummaryBuilder::start();
        reporter.on_start(work);

        for table in work {
            self.check_interrupted(table)?;
            reporter.on_table(table);

            let check = self.check_table(table, replica_catalog, reporter).await?;
            reporter.on_outcome(&check.outcome);
            summary.record(check);
        }

        Ok(summary.finish())
    }

    /// Runs the full sequence for one table.
    ///
    /// On any failure after a lock was taken, every still-held lock is released
    /// before the error is returned.
    pub async fn check_table(
        &mut self,
        table: &Table,
        replica_catalog: &Catalog,
        reporter: &mut dyn Reporter,
    ) -> Result<TableCheck, CheckError> {
        if !replica_catalog.contains(table) {
            info!("Table {} not found on replica", table);
            return Ok(TableCheck::missing(table.clone()));
        }

        let mut held = HeldLocks::default();
        match self.locked_checksums(table, reporter, &mut held).await {
            Ok(check) => Ok(check),
            Err(err) => {
                self.release(table, held).await;
                Err(err)
            }
        }
    }

    async fn locked_checksums(
        &mut self,
        table: &Table,
        reporter: &mut dyn Reporter,
        held: &mut HeldLocks,
    ) -> Result<TableCheck, CheckError> {
        self.primary
            .lock_table_read(table)
            .await
            .map_err(query_failed(Side::Primary, Operation::LockTable, Some(table)))?;
        held.primary = true;
        let primary_locked_at = Instant::now();
        notify(reporter, table, Step::LockPrimary);

        let position = self
            .primary
            .current_position()
            .await
            .map_err(query_failed(Side::Primary, Operation::ReadPosition, Some(table)))?;
        debug!("Primary position for {}: {}", table, position);
        notify(reporter, table, Step::ReadPosition);

        let primary_checksum = self
            .primary
            .checksum_table(table)
            .await
            .map_err(query_failed(Side::Primary, Operation::Checksum, Some(table)))?;
        notify(reporter, table, Step::ChecksumPrimary);

        self.wait_for_replica(table, &position).await?;
        notify(reporter, table, Step::WaitReplica);

        self.replica
            .lock_table_read(table)
            .await
            .map_err(query_failed(Side::Replica, Operation::LockTable, Some(table)))?;
        held.replica = true;
        let replica_locked_at = Instant::now();
        notify(reporter, table, Step::LockReplica);

        self.primary
            .unlock_tables()
            .await
            .map_err(query_failed(Side::Primary, Operation::UnlockTables, Some(table)))?;
        held.primary = false;
        let primary_lock = LockSpan::new(primary_locked_at, Instant::now());
        notify(reporter, table, Step::UnlockPrimary);

        let replica_checksum = self
            .replica
            .checksum_table(table)
            .await
            .map_err(query_failed(Side::Replica, Operation::Checksum, Some(table)))?;
        notify(reporter, table, Step::ChecksumReplica);

        self.replica
            .unlock_tables()
            .await
            .map_err(query_failed(Side::Replica, Operation::UnlockTables, Some(table)))?;
        held.replica = false;
        let replica_lock = LockSpan::new(replica_locked_at, Instant::now());
        notify(reporter, table, Step::UnlockReplica);

        debug!(
            "Lock times for {}: primary {:?}, replica {:?}",
            table,
            primary_lock.duration(),
            replica_lock.duration()
        );

        let outcome = if primary_checksum == replica_checksum {
            info!("Table {} in sync (checksum {})", table, primary_checksum);
            CheckOutcome::Match {
                table: table.clone(),
                checksum: primary_checksum,
            }
        } else {
            warn!(
                "Table {} checksum mismatch: primary {}, replica {}",
                table, primary_checksum, replica_checksum
            );
            CheckOutcome::ChecksumMismatch {
                table: table.clone(),
                primary: primary_checksum,
                replica: replica_checksum,
            }
        };

        Ok(TableCheck {
            outcome,
            primary_lock: Some(primary_lock),
            replica_lock: Some(replica_lock),
        })
    }

    async fn wait_for_replica(
        &mut self,
        table: &Table,
        position: &P::Position,
    ) -> Result<(), CheckError> {
        let guard = self.wait_timeout.saturating_add(WAIT_GUARD);
        let wait = self.replica.wait_for_position(position, self.wait_timeout);
        let status = match tokio::time::timeout(guard, wait).await {
            Ok(result) => result.map_err(query_failed(
                Side::Replica,
                Operation::WaitForPosition,
                Some(table),
            ))?,
            Err(_) => WaitStatus::TimedOut,
        };

        match status {
            WaitStatus::Reached => Ok(()),
            WaitStatus::TimedOut => Err(CheckError::ReplicationTimeout {
                table: table.clone(),
                position: position.to_string(),
                timeout: self.wait_timeout,
            }),
            WaitStatus::NotReplicating => Err(CheckError::ReplicationNotRunning {
                table: table.clone(),
                position: position.to_string(),
            }),
        }
    }

    async fn release(&mut self, table: &Table, held: HeldLocks) {
        if held.primary {
            if let Err(e) = self.primary.unlock_tables().await {
                warn!("Failed to release primary lock on {} after error: {}", table, e);
            }
        }
        if held.replica {
            if let Err(e) = self.replica.unlock_tables().await {
                warn!("Failed to release replica lock on {} after error: {}", table, e);
            }
        }
    }

    fn check_interrupted(&mut self, next: &Table) -> Result<(), CheckError> {
        let Some(shutdown) = self.shutdown.as_mut() else {
            return Ok(());
        };
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => Err(CheckError::Interrupted { next: next.clone() }),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => Ok(()),
        }
    }
}

fn notify(reporter: &mut dyn Reporter, table: &Table, step: Step) {
    debug!("{} {}", step.tag(), table);
    reporter.on_step(step);
}
