//! Server flavour and version detection.
//!
//! MySQL renamed its replication statements over the 8.x series. The old
//! names keep working for a while and are then removed, so the checker picks
//! the statement based on what `SELECT VERSION()` reports.

use crate::error::MySQLError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    MySQL,
    MariaDB,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerVersion {
    pub flavor: Flavor,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    /// Parses strings such as `8.0.36`, `5.7.44-log` or `10.11.6-MariaDB-1:10.11.6+maria~ubu2204`.
    pub fn parse(version: &str) -> Result<Self, MySQLError> {
        let unknown = || MySQLError::UnknownVersion(version.to_string());
        let trimmed = version.trim();
        let flavor = if trimmed.to_ascii_lowercase().contains("mariadb") {
            Flavor::MariaDB
        } else {
            Flavor::MySQL
        };

        // Old MariaDB handshakes prefix a fake 5.5.5 version.
        let trimmed = match flavor {
            Flavor::MariaDB => trimmed.strip_prefix("5.5.5-").unwrap_or(trimmed),
            Flavor::MySQL => trimmed,
        };

        let numeric = trimmed.split(['-', '+', ' ']).next().ok_or_else(unknown)?;
        let mut parts = numeric.split('.').map(|p| p.parse::<u32>());
        let major = parts.next().ok_or_else(unknown)?.map_err(|_| unknown())?;
        let minor = parts.next().transpose().map_err(|_| unknown())?.unwrap_or(0);
        let patch = parts.next().transpose().map_err(|_| unknown())?.unwrap_or(0);

        Ok(Self {
            flavor,
            major,
            minor,
            patch,
        })
    }

    fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flavor = match self.flavor {
            Flavor::MySQL => "MySQL",
            Flavor::MariaDB => "MariaDB",
        };
        write!(f, "{} {}.{}.{}", flavor, self.major, self.minor, self.patch)
    }
}

/// Statements to use for one server version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dialect {
    pub status_query: &'static str,
    pub wait_function: &'static str,
}

impl Dialect {
    pub fn for_version(version: &ServerVersion) -> Self {
        match version.flavor {
            Flavor::MariaDB => Self {
                status_query: "SHOW MASTER STATUS",
                wait_function: "MASTER_POS_WAIT",
            },
            Flavor::MySQL => Self {
                status_query: if version.at_least(8, 2, 0) {
                    "SHOW BINARY LOG STATUS"
                } else {
                    "SHOW MASTER STATUS"
                },
                wait_function: if version.at_least(8, 0, 26) {
                    "SOURCE_POS_WAIT"
                } else {
                    "MASTER_POS_WAIT"
                },
            },
        }
    }

    /// `SELECT <wait function>(?, ?, ?)` taking file, offset and timeout in seconds.
    pub fn wait_query(&self) -> String {
        format!("SELECT {}(?, ?, ?)", self.wait_function)
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            status_query: "SHOW MASTER STATUS",
            wait_function: "MASTER_POS_WAIT",
        }
    }
}
