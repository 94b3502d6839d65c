//! mysql-replication-check
//!
//! Verifies that a MySQL replica holds exactly the same data as its primary,
//! table by table, without stopping replication.
//!
//! # CLI Usage
//!
//! ```bash
//! # Check every table
//! mysql-replication-check --primary-host db1 --replica-host db2 --primary-user checker ...
//!
//! # Check one schema, skipping scratch tables, printing only on failure
//! mysql-replication-check --primary-host db1 --replica-host db2 \
//!   --tables 'shop.*' --ignore-tables 'shop.tmp_*' --quiet
//! ```
//!
//! The engine lives in `replication_check_core`; the MySQL backend in
//! `replication_check_mysql`.

pub mod args;
pub mod config;
pub mod report;

use config::CheckConfig;
use replication_check_core::{run_check, CheckError, Reporter, RunOptions, RunOutcome, Side};
use replication_check_mysql::connect;
use tokio::sync::broadcast;

/// Runs one check against the servers in `config`.
///
/// The replica is only contacted when the primary has at least one table to check.
pub async fn check(
    config: &CheckConfig,
    reporter: &mut dyn Reporter,
    shutdown: Option<broadcast::Receiver<()>>,
) -> Result<RunOutcome, CheckError> {
    let primary = connect(&config.primary, Side::Primary, config.connect_timeout).await?;

    run_check(
        primary,
        || connect(&config.replica, Side::Replica, config.connect_timeout),
        &config.selector,
        RunOptions {
            wait_timeout: config.wait_timeout,
            shutdown,
        },
        reporter,
    )
    .await
}
