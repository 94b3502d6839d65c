//! Command-line arguments.

use clap::{Args, Parser};
use std::path::PathBuf;

/// Checks that a MySQL replica holds the same data as its primary.
///
/// Each table is read-locked on the primary, checksummed, and compared with
/// the replica's checksum once the replica has applied exactly the same
/// binary log position.
#[derive(Parser, Debug, Clone)]
#[command(name = "mysql-replication-check", version, about)]
pub struct CheckArgs {
    #[command(flatten)]
    pub primary: PrimaryOpts,

    #[command(flatten)]
    pub replica: ReplicaOpts,

    /// Comma-separated `database.table` patterns to check; `*` is a wildcard
    #[arg(long, env = "CHECK_TABLES")]
    pub tables: Option<String>,

    /// Comma-separated `database.table` patterns to skip; `*` is a wildcard
    #[arg(long, env = "CHECK_IGNORE_TABLES")]
    pub ignore_tables: Option<String>,

    /// Only print output when the check fails
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Exit successfully when no table is left to check
    #[arg(long)]
    pub allow_empty: bool,

    /// How long to wait for the replica to catch up (e.g., "90", "90s", "2m")
    #[arg(long, default_value = "60s", env = "CHECK_WAIT_TIMEOUT")]
    pub wait_timeout: String,

    /// How long to wait when connecting to either server
    #[arg(long, default_value = "10s", env = "CHECK_CONNECT_TIMEOUT")]
    pub connect_timeout: String,

    /// Also write the run summary as JSON to this file
    #[arg(long)]
    pub report_file: Option<PathBuf>,
}

/// Primary server connection options
#[derive(Args, Debug, Clone)]
pub struct PrimaryOpts {
    /// Primary server host name or IP address
    #[arg(long, alias = "master-host", env = "PRIMARY_HOST")]
    pub primary_host: String,

    /// Primary server port [default: 3306]
    #[arg(long, alias = "master-port", env = "PRIMARY_PORT")]
    pub primary_port: Option<u16>,

    /// Primary server user
    #[arg(long, alias = "master-user", env = "PRIMARY_USER")]
    pub primary_user: Option<String>,

    /// Primary server password
    #[arg(long, alias = "master-password", env = "PRIMARY_PASSWORD", hide_env_values = true)]
    pub primary_password: Option<String>,

    /// CA certificate used to verify the primary's TLS certificate
    #[arg(long, alias = "master-ssl-ca", env = "PRIMARY_SSL_CA")]
    pub primary_ssl_ca: Option<PathBuf>,
}

/// Replica server connection options
#[derive(Args, Debug, Clone)]
pub struct ReplicaOpts {
    /// Replica server host name or IP address
    #[arg(long, alias = "slave-host", env = "REPLICA_HOST")]
    pub replica_host: String,

    /// Replica server port [default: 3306]
    #[arg(long, alias = "slave-port", env = "REPLICA_PORT")]
    pub replica_port: Option<u16>,

    /// Replica server user
    #[arg(long, alias = "slave-user", env = "REPLICA_USER")]
    pub replica_user: Option<String>,

    /// Replica server password
    #[arg(long, alias = "slave-password", env = "REPLICA_PASSWORD", hide_env_values = true)]
    pub replica_password: Option<String>,

    /// CA certificate used to verify the replica's TLS certificate
    #[arg(long, alias = "slave-ssl-ca", env = "REPLICA_SSL_CA")]
    pub replica_ssl_ca: Option<PathBuf>,
}
