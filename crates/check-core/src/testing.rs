//! In-memory test doubles for the database boundary.
//!
//! [`MemoryDatabase`] simulates one server session. Every call is appended to
//! a shared [`Journal`], so a test can hand the same journal to a primary and
//! a replica and assert on the exact interleaving of operations.

use crate::database::{CatalogEntry, Database, TableKind, WaitStatus};
use crate::error::BoxError;
use crate::model::{Checksum, Table};
use crate::outcome::CheckOutcome;
use crate::reporter::{Reporter, Step};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalOp {
    ListSchemas,
    ListTables(String),
    LockRead(Table),
    UnlockTables,
    ReadPosition,
    WaitForPosition(u64),
    Checksum(Table),
    Disconnect,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    pub server: String,
    pub op: JournalOp,
}

pub type Journal = Arc<Mutex<Vec<JournalEntry>>>;

pub fn new_journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// How the simulated replica answers a position wait.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitBehavior {
    #[default]
    CatchUp,
    TimeOut,
    NotReplicating,
    /// Never answers, like a replica stuck behind a long-running statement.
    Hang,
}

/// Operation that should fail with a simulated server error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailPoint {
    ListSchemas,
    ListTables,
    Lock,
    Unlock,
    ReadPosition,
    Wait,
    Checksum,
}

#[derive(Clone, Debug)]
struct MemoryTable {
    name: String,
    kind: TableKind,
    rows: Vec<String>,
}

/// One simulated server session.
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    journal: Journal,
    schemas: Vec<(String, Vec<MemoryTable>)>,
    position: u64,
    wait_behavior: WaitBehavior,
    fail_on: Option<FailPoint>,
    locked: Vec<Table>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>, journal: Journal) -> Self {
        Self {
            name: name.into(),
            journal,
            schemas: Vec::new(),
            position: 0,
            wait_behavior: WaitBehavior::default(),
            fail_on: None,
            locked: Vec::new(),
        }
    }

    pub fn with_table(self, schema: &str, name: &str, rows: &[&str]) -> Self {
        self.with_entry(
            schema,
            MemoryTable {
                name: name.to_string(),
                kind: TableKind::BaseTable,
                rows: rows.iter().map(|r| r.to_string()).collect(),
            },
        )
    }

    pub fn with_view(self, schema: &str, name: &str) -> Self {
        self.with_entry(
            schema,
            MemoryTable {
                name: name.to_string(),
                kind: TableKind::View,
                rows: Vec::new(),
            },
        )
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_wait_behavior(mut self, behavior: WaitBehavior) -> Self {
        self.wait_behavior = behavior;
        self
    }

    pub fn failing_on(mut self, point: FailPoint) -> Self {
        self.fail_on = Some(point);
        self
    }

    /// Tables currently held under a read lock by this session.
    pub fn locked(&self) -> &[Table] {
        &self.locked
    }

    /// Checksum the session would report for `table`, if it exists.
    pub fn checksum_of(&self, table: &Table) -> Option<Checksum> {
        self.find(table).map(|t| rows_checksum(&t.rows))
    }

    fn with_entry(mut self, schema: &str, table: MemoryTable) -> Self {
        match self.schemas.iter_mut().find(|(s, _)| s == schema) {
            Some((_, tables)) => tables.push(table),
            None => self.schemas.push((schema.to_string(), vec![table])),
        }
        self
    }

    fn find(&self, table: &Table) -> Option<&MemoryTable> {
        self.schemas
            .iter()
            .find(|(s, _)| *s == table.schema)
            .and_then(|(_, tables)| tables.iter().find(|t| t.name == table.name))
    }

    fn record(&self, op: JournalOp) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(JournalEntry {
                server: self.name.clone(),
                op,
            });
    }

    fn check_fail(&self, point: FailPoint) -> Result<(), BoxError> {
        if self.fail_on == Some(point) {
            return Err(format!("simulated {point:?} failure on {}", self.name).into());
        }
        Ok(())
    }
}

/// Order-independent sum of per-row FNV-1a hashes.
fn rows_checksum(rows: &[String]) -> Checksum {
    let sum = rows.iter().fold(0u64, |acc, row| acc.wrapping_add(fnv1a(row.as_bytes())));
    Checksum(sum)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait::async_trait]
impl Database for MemoryDatabase {
    type Position = u64;

    async fn list_schemas(&mut self) -> Result<Vec<String>, BoxError> {
        self.record(JournalOp::ListSchemas);
        self.check_fail(FailPoint::ListSchemas)?;
        Ok(self.schemas.iter().map(|(s, _)| s.clone()).collect())
    }

    async fn list_tables(&mut self, schema: &str) -> Result<Vec<CatalogEntry>, BoxError> {
        self.record(JournalOp::ListTables(schema.to_string()));
        self.check_fail(FailPoint::ListTables)?;
        Ok(self
            .schemas
            .iter()
            .filter(|(s, _)| s == schema)
            .flat_map(|(_, tables)| tables)
            .map(|t| CatalogEntry::new(t.name.clone(), t.kind.clone()))
            .collect())
    }

    async fn lock_table_read(&mut self, table: &Table) -> Result<(), BoxError> {
        self.record(JournalOp::LockRead(table.clone()));
        self.check_fail(FailPoint::Lock)?;
        if self.find(table).is_none() {
            return Err(format!("Table '{table}' doesn't exist").into());
        }
        // LOCK TABLES replaces whatever the session held before.
        self.locked = vec![table.clone()];
        Ok(())
    }

    async fn unlock_tables(&mut self) -> Result<(), BoxError> {
        self.record(JournalOp::UnlockTables);
        self.check_fail(FailPoint::Unlock)?;
        self.locked.clear();
        Ok(())
    }

    async fn current_position(&mut self) -> Result<u64, BoxError> {
        self.record(JournalOp::ReadPosition);
        self.check_fail(FailPoint::ReadPosition)?;
        Ok(self.position)
    }

    async fn wait_for_position(
        &mut self,
        position: &u64,
        _timeout: Duration,
    ) -> Result<WaitStatus, BoxError> {
        self.record(JournalOp::WaitForPosition(*position));
        self.check_fail(FailPoint::Wait)?;
        Ok(match self.wait_behavior {
            WaitBehavior::CatchUp => {
                self.position = self.position.max(*position);
                WaitStatus::Reached
            }
            WaitBehavior::TimeOut => WaitStatus::TimedOut,
            WaitBehavior::NotReplicating => WaitStatus::NotReplicating,
            WaitBehavior::Hang => std::future::pending().await,
        })
    }

    async fn checksum_table(&mut self, table: &Table) -> Result<Checksum, BoxError> {
        self.record(JournalOp::Checksum(table.clone()));
        self.check_fail(FailPoint::Checksum)?;
        self.checksum_of(table)
            .ok_or_else(|| format!("Table '{table}' doesn't exist").into())
    }

    async fn disconnect(self) -> Result<(), BoxError> {
        self.record(JournalOp::Disconnect);
        Ok(())
    }
}

/// A reporter notification, as captured by [`RecordingReporter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportEvent {
    Start(Vec<Table>),
    Table(Table),
    Step(Step),
    Outcome(CheckOutcome),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl Reporter for RecordingReporter {
    fn on_start(&mut self, work: &[Table]) {
        self.events.push(ReportEvent::Start(work.to_vec()));
    }

    fn on_table(&mut self, table: &Table) {
        self.events.push(ReportEvent::Table(table.clone()));
    }

    fn on_step(&mut self, step: Step) {
        self.events.push(ReportEvent::Step(step));
    }

    fn on_outcome(&mut self, outcome: &CheckOutcome) {
        self.events.push(ReportEvent::Outcome(outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checksum_ignores_row_order() {
        let mut a = MemoryDatabase::new("a", new_journal()).with_table("db", "t", &["x", "y", "z"]);
        let mut b = MemoryDatabase::new("b", new_journal()).with_table("db", "t", &["z", "x", "y"]);
        let table = Table::new("db", "t");

        assert_eq!(
            a.checksum_table(&table).await.unwrap(),
            b.checksum_table(&table).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_extra_row_changes_checksum() {
        let a = MemoryDatabase::new("a", new_journal()).with_table("db", "t", &["a", "b", "c"]);
        let b = MemoryDatabase::new("b", new_journal()).with_table("db", "t", &["a", "b", "c", "d"]);
        let table = Table::new("db", "t");

        assert_ne!(a.checksum_of(&table), b.checksum_of(&table));
    }

    #[tokio::test]
    async fn test_lock_and_unlock_track_state() {
        let journal = new_journal();
        let mut db = MemoryDatabase::new("primary", journal.clone()).with_table("db", "t", &[]);
        let table = Table::new("db", "t");

        db.lock_table_read(&table).await.unwrap();
        assert_eq!(db.locked(), &[table.clone()]);
        db.unlock_tables().await.unwrap();
        assert!(db.locked().is_empty());
        assert!(db.lock_table_read(&Table::new("db", "nope")).await.is_err());
        assert_eq!(journal.lock().unwrap().len(), 3);
    }
}
