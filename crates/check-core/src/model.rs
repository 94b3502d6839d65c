//! Identity types shared by every stage of a check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A checkable table, identified by schema and table name.
///
/// Equality and hashing are structural so a `Table` can be used directly as a
/// set element when testing whether a primary table exists on the replica.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Which end of the replication link an operation ran against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Primary,
    Replica,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Primary => f.write_str("primary"),
            Side::Replica => f.write_str("replica"),
        }
    }
}

/// Content checksum of a table as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub u64);

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection target for one side of the check.
///
/// Built once from the command line and never modified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Server {
    host: String,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    ssl_ca: Option<PathBuf>,
}

impl Server {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: None,
            password: None,
            ssl_ca: None,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    pub fn with_ssl_ca(mut self, ssl_ca: Option<PathBuf>) -> Self {
        self.ssl_ca = ssl_ca;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn ssl_ca(&self) -> Option<&Path> {
        self.ssl_ca.as_deref()
    }

    /// `host` or `host:port`, for diagnostics.
    pub fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl_ca", &self.ssl_ca)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_equality_is_by_value() {
        let mut set = HashSet::new();
        set.insert(Table::new("db", "t1"));

        assert!(set.contains(&Table::new("db", "t1")));
        assert!(!set.contains(&Table::new("db", "t2")));
        assert!(!set.contains(&Table::new("other", "t1")));
    }

    #[test]
    fn test_table_display() {
        assert_eq!(Table::new("shop", "orders").to_string(), "shop.orders");
    }

    #[test]
    fn test_server_address() {
        let server = Server::new("db.example.com");
        assert_eq!(server.address(), "db.example.com");

        let server = server.with_port(Some(3307));
        assert_eq!(server.address(), "db.example.com:3307");
    }

    #[test]
    fn test_server_debug_hides_password() {
        let server = Server::new("localhost")
            .with_credentials(Some("root".to_string()), Some("hunter2".to_string()));

        let debug = format!("{server:?}");
        assert!(debug.contains("root"));
        assert!(!debug.contains("hunter2"));
    }
}
