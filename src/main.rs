//! Command-line interface for mysql-replication-check
//!
//! # Usage Examples
//!
//! ```bash
//! # Check all tables; exit status 0 means the replica is consistent
//! mysql-replication-check \
//!   --primary-host db1 --primary-user checker --primary-password secret \
//!   --replica-host db2 --replica-user checker --replica-password secret
//!
//! # Restrict to some tables and keep a JSON report
//! mysql-replication-check --primary-host db1 --replica-host db2 \
//!   --tables 'shop.*,blog.posts' --report-file report.json
//! ```
//!
//! Passwords may also be given through `PRIMARY_PASSWORD` / `REPLICA_PASSWORD`.
//! Set `RUST_LOG=debug` for diagnostic logs on stderr.

use anyhow::Context;
use clap::Parser;
use mysql_replication_check::args::CheckArgs;
use mysql_replication_check::config::CheckConfig;
use mysql_replication_check::report::{write_json_report, write_summary, ConsoleReporter};
use mysql_replication_check::check;
use replication_check_core::RunOutcome;
use std::io::Write;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match CheckArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: CheckArgs) -> anyhow::Result<i32> {
    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = CheckConfig::from_args(args)?;
    info!(
        "Checking replica {} against primary {}",
        config.replica.address(),
        config.primary.address()
    );

    let shutdown = setup_shutdown_handler();
    let stdout = std::io::stdout();
    let mut reporter = ConsoleReporter::new(stdout.lock(), config.quiet);

    let outcome = match check(&config, &mut reporter, Some(shutdown)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // The error goes to stderr; keep stdout from ending mid-line
            let _ = reporter.abandon();
            return Err(e.into());
        }
    };

    let mut out = reporter.finish().context("Failed to write progress")?;
    match &outcome {
        RunOutcome::NothingToDo => writeln!(out, "Nothing to do.")?,
        RunOutcome::Completed(summary) => {
            write_summary(&mut out, summary, config.quiet).context("Failed to write summary")?
        }
    }
    out.flush()?;

    if let Some(path) = &config.report_file {
        write_json_report(path, &outcome)?;
        info!("Wrote report to {}", path.display());
    }

    Ok(outcome.exit_code(config.empty_policy))
}

/// Sends on the returned channel when Ctrl+C is pressed.
///
/// The checker only looks at it between tables, so a table in progress is
/// finished and its locks released first. A second Ctrl+C exits at once;
/// the servers drop the session's table locks when the connections close.
fn setup_shutdown_handler() -> tokio::sync::broadcast::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    tokio::spawn(async move {
        let mut interrupted = false;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                return;
            }
            if interrupted {
                warn!("Second interrupt received, exiting without waiting for the current table");
                std::process::exit(1);
            }
            interrupted = true;
            warn!("Interrupt received, stopping after the current table (press Ctrl+C again to exit now)");
            let _ = shutdown_tx.send(());
        }
    });

    shutdown_rx
}
