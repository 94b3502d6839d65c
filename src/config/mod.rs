//! Validated run configuration.

pub mod duration;

use crate::args::CheckArgs;
use duration::parse_duration;
use replication_check_core::{CheckError, EmptyWorkListPolicy, Server, TableSelector};
use std::path::PathBuf;
use std::time::Duration;

/// Longest replica wait accepted on the command line.
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Everything a run needs, checked once before any server is contacted.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub primary: Server,
    pub replica: Server,
    pub selector: TableSelector,
    pub quiet: bool,
    pub empty_policy: EmptyWorkListPolicy,
    pub wait_timeout: Duration,
    pub connect_timeout: Duration,
    pub report_file: Option<PathBuf>,
}

impl CheckConfig {
    pub fn from_args(args: CheckArgs) -> Result<Self, CheckError> {
        let primary = server(
            "primary",
            args.primary.primary_host,
            args.primary.primary_port,
            args.primary.primary_user,
            args.primary.primary_password,
            args.primary.primary_ssl_ca,
        )?;
        let replica = server(
            "replica",
            args.replica.replica_host,
            args.replica.replica_port,
            args.replica.replica_user,
            args.replica.replica_password,
            args.replica.replica_ssl_ca,
        )?;

        let selector =
            TableSelector::from_patterns(args.tables.as_deref(), args.ignore_tables.as_deref())?;

        let wait_timeout = timeout("--wait-timeout", &args.wait_timeout)?;
        if wait_timeout < Duration::from_secs(1) {
            return Err(CheckError::Usage(
                "--wait-timeout must be at least one second".to_string(),
            ));
        }
        if wait_timeout > MAX_WAIT_TIMEOUT {
            return Err(CheckError::Usage(
                "--wait-timeout must not exceed 24 hours".to_string(),
            ));
        }
        let connect_timeout = timeout("--connect-timeout", &args.connect_timeout)?;

        Ok(Self {
            primary,
            replica,
            selector,
            quiet: args.quiet,
            empty_policy: if args.allow_empty {
                EmptyWorkListPolicy::Succeed
            } else {
                EmptyWorkListPolicy::Fail
            },
            wait_timeout,
            connect_timeout,
            report_file: args.report_file,
        })
    }
}

fn server(
    side: &str,
    host: String,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    ssl_ca: Option<PathBuf>,
) -> Result<Server, CheckError> {
    if host.trim().is_empty() {
        return Err(CheckError::Usage(format!("the {side} host must not be empty")));
    }
    if port == Some(0) {
        return Err(CheckError::Usage(format!("the {side} port must not be 0")));
    }
    Ok(Server::new(host.trim())
        .with_port(port)
        .with_credentials(user, password)
        .with_ssl_ca(ssl_ca))
}

fn timeout(flag: &str, value: &str) -> Result<Duration, CheckError> {
    let parsed = parse_duration(value).map_err(|e| CheckError::Usage(format!("{flag}: {e:#}")))?;
    if parsed.is_zero() {
        return Err(CheckError::Usage(format!("{flag} must be greater than zero")));
    }
    Ok(parsed)
}
