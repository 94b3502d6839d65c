//! End-to-end orchestration of one check run.

use crate::catalog::read_catalog;
use crate::checker::{ConsistencyChecker, DEFAULT_WAIT_TIMEOUT};
use crate::database::Database;
use crate::error::CheckError;
use crate::filter::TableSelector;
use crate::model::{Side, Table};
use crate::reporter::Reporter;
use crate::summary::RunSummary;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// What an empty work list means for the exit status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyWorkListPolicy {
    /// Treat "nothing to do" as a failure, most likely a filter typo.
    #[default]
    Fail,
    Succeed,
}

#[derive(Debug)]
pub struct RunOptions {
    pub wait_timeout: Duration,
    pub shutdown: Option<broadcast::Receiver<()>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            shutdown: None,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The primary had no tables left after filtering; the replica was never contacted.
    NothingToDo,
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn exit_code(&self, policy: EmptyWorkListPolicy) -> i32 {
        match self {
            RunOutcome::NothingToDo => match policy {
                EmptyWorkListPolicy::Fail => 1,
                EmptyWorkListPolicy::Succeed => 0,
            },
            RunOutcome::Completed(summary) if summary.is_success() => 0,
            RunOutcome::Completed(_) => 1,
        }
    }
}

/// Runs a full check.
///
/// Takes ownership of an already connected `primary`. The replica is only
/// connected, through `connect_replica`, once the work list is known to be
/// non-empty. Both sessions are closed before returning, whatever the result.
pub async fn run_check<P, R, F, Fut>(
    mut primary: P,
    connect_replica: F,
    selector: &TableSelector,
    options: RunOptions,
    reporter: &mut dyn Reporter,
) -> Result<RunOutcome, CheckError>
where
    P: Database,
    R: Database<Position = P::Position>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, CheckError>>,
{
    let work = match read_catalog(&mut primary, Side::Primary).await {
        Ok(catalog) => selector.select(catalog.tables()),
        Err(e) => {
            close(primary, Side::Primary).await;
            return Err(e);
        }
    };

    if work.is_empty() {
        info!("No tables selected on primary, nothing to do");
        close(primary, Side::Primary).await;
        return Ok(RunOutcome::NothingToDo);
    }
    info!("Selected {} tables for checking", work.len());

    let mut replica = match connect_replica().await {
        Ok(replica) => replica,
        Err(e) => {
            close(primary, Side::Primary).await;
            return Err(e);
        }
    };

    let result = check_all(&mut primary, &mut replica, &work, options, reporter).await;

    close(primary, Side::Primary).await;
    close(replica, Side::Replica).await;

    result.map(RunOutcome::Completed)
}

async fn check_all<P, R>(
    primary: &mut P,
    replica: &mut R,
    work: &[Table],
    options: RunOptions,
    reporter: &mut dyn Reporter,
) -> Result<RunSummary, CheckError>
where
    P: Database,
    R: Database<Position = P::Position>,
{
    let replica_catalog = read_catalog(replica, Side::Replica).await?;

    let mut checker =
        ConsistencyChecker::new(primary, replica).with_wait_timeout(options.wait_timeout);
    if let Some(shutdown) = options.shutdown {
        checker = checker.with_shutdown(shutdown);
    }
    checker.run(work, &replica_catalog, reporter).await
}

async fn close<D: Database>(db: D, side: Side) {
    if let Err(e) = db.disconnect().await {
        warn!("Failed to disconnect from {} server: {}", side, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::CheckOutcome;
    use crate::reporter::NullReporter;
    use crate::testing::{new_journal, Journal, JournalOp, MemoryDatabase, WaitBehavior};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn disconnects(journal: &Journal) -> Vec<String> {
        journal
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.op == JournalOp::Disconnect)
            .map(|e| e.server.clone())
            .collect()
    }

    fn in_sync_pair(journal: &Journal) -> (MemoryDatabase, MemoryDatabase) {
        let primary = MemoryDatabase::new("primary", journal.clone())
            .with_table("db", "t1", &["a", "b"])
            .with_table("db", "t2", &["c"]);
        let replica = MemoryDatabase::new("replica", journal.clone())
            .with_table("db", "t1", &["a", "b"])
            .with_table("db", "t2", &["c"]);
        (primary, replica)
    }

    #[tokio::test]
    async fn test_all_tables_in_sync() {
        let journal = new_journal();
        let (primary, replica) = in_sync_pair(&journal);

        let outcome = run_check(
            primary,
            || async { Ok(replica) },
            &TableSelector::default(),
            RunOptions::default(),
            &mut NullReporter,
        )
        .await
        .unwrap();

        let RunOutcome::Completed(summary) = &outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        assert_eq!(summary.table_count(), 2);
        assert_eq!(summary.error_count(), 0);
        assert_eq!(outcome.exit_code(EmptyWorkListPolicy::Fail), 0);
        assert_eq!(disconnects(&journal), ["primary", "replica"]);
    }

    #[tokio::test]
    async fn test_mismatch_and_missing_table_fail_the_run() {
        let journal = new_journal();
        let primary = MemoryDatabase::new("primary", journal.clone())
            .with_table("test", "in_sync", &["a", "b", "c"])
            .with_table("test", "different_checksum", &["a", "b", "c"])
            .with_table("test", "primary_only", &["a"]);
        let replica = MemoryDatabase::new("replica", journal.clone())
            .with_table("test", "in_sync", &["a", "b", "c"])
            .with_table("test", "different_checksum", &["a", "b", "c", "d"]);

        let outcome = run_check(
            primary,
            || async { Ok(replica) },
            &TableSelector::default(),
            RunOptions::default(),
            &mut NullReporter,
        )
        .await
        .unwrap();

        let RunOutcome::Completed(summary) = &outcome else {
            panic!("expected a completed run, got {outcome:?}");
        };
        let errors: Vec<&Table> = summary.errors().map(CheckOutcome::table).collect();
        assert_eq!(
            errors,
            [
                &Table::new("test", "different_checksum"),
                &Table::new("test", "primary_only"),
            ]
        );
        assert_eq!(outcome.exit_code(EmptyWorkListPolicy::Fail), 1);
    }

    #[tokio::test]
    async fn test_empty_work_list_never_contacts_replica() {
        let journal = new_journal();
        let (primary, replica) = in_sync_pair(&journal);
        let selector = TableSelector::from_patterns(Some("nosuchdb.*"), None).unwrap();
        let connected = AtomicBool::new(false);

        let outcome = run_check(
            primary,
            || async {
                connected.store(true, Ordering::SeqCst);
                Ok(replica)
            },
            &selector,
            RunOptions::default(),
            &mut NullReporter,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, RunOutcome::NothingToDo));
        assert!(!connected.load(Ordering::SeqCst));
        assert_eq!(outcome.exit_code(EmptyWorkListPolicy::Fail), 1);
        assert_eq!(outcome.exit_code(EmptyWorkListPolicy::Succeed), 0);
        assert!(journal.lock().unwrap().iter().all(|e| e.server == "primary"));
        assert_eq!(disconnects(&journal), ["primary"]);
    }

    #[tokio::test]
    async fn test_replica_timeout_aborts_and_disconnects_both() {
        let journal = new_journal();
        let (primary, replica) = in_sync_pair(&journal);
        let replica = replica.with_wait_behavior(WaitBehavior::TimeOut);

        let err = run_check(
            primary,
            || async { Ok(replica) },
            &TableSelector::default(),
            RunOptions {
                wait_timeout: Duration::from_secs(2),
                shutdown: None,
            },
            &mut NullReporter,
        )
        .await
        .unwrap_err();

        assert!(err.is_replication_failure());
        assert_eq!(disconnects(&journal), ["primary", "replica"]);
        let checksums = journal
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e.op, JournalOp::Checksum(_)))
            .count();
        assert_eq!(checksums, 1, "no table after the failing one is checked");
    }

    #[tokio::test]
    async fn test_replica_connect_failure_closes_primary() {
        let journal = new_journal();
        let (primary, _) = in_sync_pair(&journal);

        let err = run_check::<_, MemoryDatabase, _, _>(
            primary,
            || async {
                Err(CheckError::Connectivity {
                    side: Side::Replica,
                    target: "replica.example:3306".to_string(),
                    source: "connection refused".into(),
                })
            },
            &TableSelector::default(),
            RunOptions::default(),
            &mut NullReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CheckError::Connectivity { side: Side::Replica, .. }));
        assert_eq!(disconnects(&journal), ["primary"]);
    }
}
