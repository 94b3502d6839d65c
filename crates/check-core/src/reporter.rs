//! Progress notifications from the checker.
//!
//! The checker never writes output itself; it notifies a [`Reporter`], which
//! owns all verbosity decisions.

use crate::model::Table;
use crate::outcome::CheckOutcome;

/// A step of the per-table lock/checksum sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    LockPrimary,
    ReadPosition,
    ChecksumPrimary,
    WaitReplica,
    LockReplica,
    UnlockPrimary,
    ChecksumReplica,
    UnlockReplica,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Step; 8] = [
        Step::LockPrimary,
        Step::ReadPosition,
        Step::ChecksumPrimary,
        Step::WaitReplica,
        Step::LockReplica,
        Step::UnlockPrimary,
        Step::ChecksumReplica,
        Step::UnlockReplica,
    ];

    /// Two-letter column tag used in progress output.
    pub fn tag(self) -> &'static str {
        match self {
            Step::LockPrimary => "ML",
            Step::ReadPosition => "MB",
            Step::ChecksumPrimary => "MC",
            Step::WaitReplica => "SW",
            Step::LockReplica => "SL",
            Step::UnlockPrimary => "MU",
            Step::ChecksumReplica => "SC",
            Step::UnlockReplica => "SU",
        }
    }
}

pub trait Reporter {
    /// Called once with the full work list before the first table.
    fn on_start(&mut self, _work: &[Table]) {}

    /// Called before each table is checked.
    fn on_table(&mut self, _table: &Table) {}

    fn on_step(&mut self, step: Step);

    fn on_outcome(&mut self, outcome: &CheckOutcome);
}

/// Discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_step(&mut self, _step: Step) {}

    fn on_outcome(&mut self, _outcome: &CheckOutcome) {}
}
