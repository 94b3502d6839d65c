//! Console progress output, the final summary and the JSON report.

use chrono::{DateTime, Utc};
use replication_check_core::{
    CheckOutcome, LockStats, Reporter, RunOutcome, RunSummary, Step, Table,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

const STEP_MARK: &str = ".  ";
const SKIPPED_MARK: &str = "-  ";

/// Prints a progress grid: one line per table, one column per step.
///
/// ```text
///                             ML MB MC SW SL MU SC SU
/// test.different_checksum     .  .  .  .  .  .  .  .  ERR - Checksum
/// test.in_sync                .  .  .  .  .  .  .  .  OK
/// ```
///
/// In quiet mode nothing is printed while the run is in progress.
pub struct ConsoleReporter<W: Write> {
    out: W,
    quiet: bool,
    width: usize,
    line_open: bool,
    error: Option<io::Error>,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, quiet: bool) -> Self {
        Self {
            out,
            quiet,
            width: 0,
            line_open: false,
            error: None,
        }
    }

    /// Returns the first write error seen while reporting, if any.
    pub fn finish(self) -> io::Result<W> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }

    /// Ends a table line left unfinished by a fatal error, so later output
    /// starts on a fresh line.
    pub fn abandon(mut self) -> io::Result<W> {
        if self.line_open {
            self.write("\n");
            self.line_open = false;
        }
        if !self.quiet && self.error.is_none() {
            if let Err(e) = self.out.flush() {
                self.error = Some(e);
            }
        }
        self.finish()
    }

    fn write(&mut self, text: &str) {
        if self.quiet || self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            self.error = Some(e);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn on_start(&mut self, work: &[Table]) {
        self.width = work
            .iter()
            .map(|t| t.schema.len() + t.name.len() + 1)
            .max()
            .unwrap_or(0)
            + 1;
        let tags: Vec<&str> = Step::ALL.iter().map(|s| s.tag()).collect();
        let header = format!("{:width$}{}\n", "", tags.join(" "), width = self.width);
        self.write(&header);
    }

    fn on_table(&mut self, table: &Table) {
        let name = format!("{:width$}", table.to_string(), width = self.width);
        self.write(&name);
        self.line_open = true;
    }

    fn on_step(&mut self, _step: Step) {
        self.write(STEP_MARK);
    }

    fn on_outcome(&mut self, outcome: &CheckOutcome) {
        let line = match outcome {
            CheckOutcome::Match { .. } => "OK\n".to_string(),
            CheckOutcome::ChecksumMismatch { .. } => "ERR - Checksum\n".to_string(),
            CheckOutcome::MissingOnReplica { .. } => {
                format!("{}ERR - Table not found\n", SKIPPED_MARK.repeat(Step::ALL.len()))
            }
        };
        self.write(&line);
        self.line_open = false;
    }
}

fn reason(outcome: &CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Match { .. } => "match",
        CheckOutcome::ChecksumMismatch { .. } => "checksum mismatch",
        CheckOutcome::MissingOnReplica { .. } => "not found on replica",
    }
}

/// Writes the end-of-run summary.
///
/// Timing and totals are omitted in quiet mode. The list of tables in error is
/// always written when there is at least one.
pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary, quiet: bool) -> io::Result<()> {
    if !quiet {
        writeln!(out)?;
        writeln!(out, "Total time: {:.0} seconds", summary.elapsed().as_secs_f64())?;
        write_lock_stats(out, "primary", summary.primary_locks())?;
        write_lock_stats(out, "replica", summary.replica_locks())?;
        writeln!(out)?;
        writeln!(
            out,
            "{} tables checked, {} errors",
            summary.table_count(),
            summary.error_count()
        )?;
    }

    if !quiet || summary.error_count() > 0 {
        writeln!(out, "Tables in error: {}", summary.error_count())?;
        for outcome in summary.errors() {
            writeln!(out, " - {} ({})", outcome.table(), reason(outcome))?;
        }
    }
    Ok(())
}

fn write_lock_stats<W: Write>(out: &mut W, side: &str, stats: &LockStats) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Total {side} lock time: {:.0} seconds",
        stats.total.as_secs_f64()
    )?;
    writeln!(
        out,
        "Longest {side} lock time: {:.1} seconds",
        stats.longest.as_secs_f64()
    )
}

/// Lock timing totals for one side, in seconds.
#[derive(Debug, Serialize)]
pub struct LockReport {
    pub count: u32,
    pub total_secs: f64,
    pub longest_secs: f64,
}

impl From<&LockStats> for LockReport {
    fn from(stats: &LockStats) -> Self {
        Self {
            count: stats.count,
            total_secs: stats.total.as_secs_f64(),
            longest_secs: stats.longest.as_secs_f64(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Failed,
    NothingToDo,
}

/// Machine-readable summary written by `--report-file`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_secs: f64,
    pub tables_checked: usize,
    pub errors: usize,
    pub primary_locks: Option<LockReport>,
    pub replica_locks: Option<LockReport>,
    pub outcomes: &'a [CheckOutcome],
}

impl<'a> JsonReport<'a> {
    pub fn new(outcome: &'a RunOutcome) -> Self {
        match outcome {
            RunOutcome::NothingToDo => Self {
                status: RunStatus::NothingToDo,
                started_at: None,
                elapsed_secs: 0.0,
                tables_checked: 0,
                errors: 0,
                primary_locks: None,
                replica_locks: None,
                outcomes: &[],
            },
            RunOutcome::Completed(summary) => Self {
                status: if summary.is_success() {
                    RunStatus::Ok
                } else {
                    RunStatus::Failed
                },
                started_at: Some(summary.started_at()),
                elapsed_secs: summary.elapsed().as_secs_f64(),
                tables_checked: summary.table_count(),
                errors: summary.error_count(),
                primary_locks: Some(summary.primary_locks().into()),
                replica_locks: Some(summary.replica_locks().into()),
                outcomes: summary.outcomes(),
            },
        }
    }
}

pub fn write_json_report(path: &Path, outcome: &RunOutcome) -> anyhow::Result<()> {
    use anyhow::Context;

    let report = JsonReport::new(outcome);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication_check_core::{Checksum, SummaryBuilder, TableCheck};

    fn t(name: &str) -> Table {
        Table::new("test", name)
    }

    fn render<F: FnOnce(&mut ConsoleReporter<Vec<u8>>)>(quiet: bool, f: F) -> String {
        let mut reporter = ConsoleReporter::new(Vec::new(), quiet);
        f(&mut reporter);
        String::from_utf8(reporter.finish().unwrap()).unwrap()
    }

    fn summary_with(outcomes: Vec<CheckOutcome>) -> RunSummary {
        let mut builder = SummaryBuilder::start();
        for outcome in outcomes {
            builder.record(TableCheck {
                outcome,
                primary_lock: None,
                replica_lock: None,
            });
        }
        builder.finish()
    }

    #[test]
    fn test_progress_grid() {
        let work = [t("in_sync"), t("different_checksum"), t("gone")];
        let output = render(false, |r| {
            r.on_start(&work);
            r.on_table(&work[0]);
            for step in Step::ALL {
                r.on_step(step);
            }
            r.on_outcome(&CheckOutcome::Match {
                table: work[0].clone(),
                checksum: Checksum(1),
            });
            r.on_table(&work[2]);
            r.on_outcome(&CheckOutcome::MissingOnReplica {
                table: work[2].clone(),
            });
        });

        let lines: Vec<&str> = output.lines().collect();
        // "test.different_checksum" is 23 characters, plus one space.
        assert_eq!(lines[0], format!("{}ML MB MC SW SL MU SC SU", " ".repeat(24)));
        assert_eq!(
            lines[1],
            format!("test.in_sync{}{}OK", " ".repeat(12), ".  ".repeat(8))
        );
        assert_eq!(
            lines[2],
            format!("test.gone{}{}ERR - Table not found", " ".repeat(15), "-  ".repeat(8))
        );
    }

    #[test]
    fn test_abandon_ends_unfinished_line() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        reporter.on_start(&[t("a")]);
        reporter.on_table(&t("a"));
        reporter.on_step(Step::LockPrimary);

        let output = String::from_utf8(reporter.abandon().unwrap()).unwrap();
        assert!(output.ends_with("test.a .  \n"), "{output:?}");
    }

    #[test]
    fn test_abandon_between_tables_adds_nothing() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        reporter.on_start(&[t("a")]);
        reporter.on_table(&t("a"));
        reporter.on_outcome(&CheckOutcome::MissingOnReplica { table: t("a") });
        let finished = String::from_utf8(reporter.abandon().unwrap()).unwrap();
        assert!(finished.ends_with("ERR - Table not found\n"));
        assert!(!finished.ends_with("\n\n"));

        let mut quiet = ConsoleReporter::new(Vec::new(), true);
        quiet.on_table(&t("a"));
        assert!(quiet.abandon().unwrap().is_empty());
    }

    #[test]
    fn test_quiet_progress_prints_nothing() {
        let output = render(true, |r| {
            r.on_start(&[t("a")]);
            r.on_table(&t("a"));
            r.on_step(Step::LockPrimary);
            r.on_outcome(&CheckOutcome::ChecksumMismatch {
                table: t("a"),
                primary: Checksum(1),
                replica: Checksum(2),
            });
        });
        assert!(output.is_empty());
    }

    #[test]
    fn test_summary_lists_tables_in_error() {
        let summary = summary_with(vec![
            CheckOutcome::Match {
                table: t("in_sync"),
                checksum: Checksum(1),
            },
            CheckOutcome::ChecksumMismatch {
                table: t("different_checksum"),
                primary: Checksum(1),
                replica: Checksum(2),
            },
        ]);

        let mut out = Vec::new();
        write_summary(&mut out, &summary, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Total time: 0 seconds"));
        assert!(text.contains("Longest primary lock time: 0.0 seconds"));
        assert!(text.contains("2 tables checked, 1 errors"));
        assert!(text.contains("Tables in error: 1\n - test.different_checksum (checksum mismatch)\n"));
    }

    #[test]
    fn test_quiet_summary_is_silent_on_success() {
        let summary = summary_with(vec![CheckOutcome::Match {
            table: t("in_sync"),
            checksum: Checksum(1),
        }]);

        let mut out = Vec::new();
        write_summary(&mut out, &summary, true).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_quiet_summary_still_reports_errors() {
        let summary = summary_with(vec![CheckOutcome::MissingOnReplica { table: t("gone") }]);

        let mut out = Vec::new();
        write_summary(&mut out, &summary, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Tables in error: 1\n - test.gone (not found on replica)\n"
        );
    }

    #[test]
    fn test_json_report() {
        let outcome = RunOutcome::Completed(summary_with(vec![CheckOutcome::ChecksumMismatch {
            table: t("different_checksum"),
            primary: Checksum(10),
            replica: Checksum(11),
        }]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_json_report(&path, &outcome).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["tables_checked"], 1);
        assert_eq!(json["errors"], 1);
        assert_eq!(json["outcomes"][0]["outcome"], "checksum_mismatch");
        assert_eq!(json["outcomes"][0]["table"]["name"], "different_checksum");
        assert!(json["started_at"].is_string());
    }

    #[test]
    fn test_json_report_nothing_to_do() {
        let json = serde_json::to_value(JsonReport::new(&RunOutcome::NothingToDo)).unwrap();
        assert_eq!(json["status"], "nothing_to_do");
        assert_eq!(json["outcomes"].as_array().map(Vec::len), Some(0));
    }
}
