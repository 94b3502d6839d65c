//! A primary/replica pair with known divergence.
//!
//! After [`bootstrap_replication`]:
//!
//! - `test.in_sync` holds rows `a`, `b`, `c` on both servers
//! - `test.different_checksum` holds `a`, `b`, `c` on the primary and an extra
//!   `d` on the replica
//! - `test.primary_only` exists on the primary only (created with binary
//!   logging switched off for the session)

use super::container::{MySQLContainer, ROOT_PASSWORD};
use crate::client::server_version;
use crate::database::read_position;
use crate::dialect::Dialect;
use anyhow::{Context, Result};
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use std::process::{Command, Stdio};
use tracing::info;

const PRIMARY_SEED: &[&str] = &[
    "CREATE DATABASE IF NOT EXISTS test",
    "CREATE TABLE test.in_sync (
        id INT UNSIGNED NOT NULL AUTO_INCREMENT,
        name VARCHAR(255) NOT NULL,
        PRIMARY KEY (id)
    )",
    "CREATE TABLE test.different_checksum (
        id INT UNSIGNED NOT NULL AUTO_INCREMENT,
        name VARCHAR(255) NOT NULL,
        PRIMARY KEY (id)
    )",
    "INSERT INTO test.in_sync (name) VALUES ('a'), ('b'), ('c')",
    "INSERT INTO test.different_checksum (name) VALUES ('a'), ('b'), ('c')",
];

const PRIMARY_ONLY: &[&str] = &[
    "SET sql_log_bin = 0",
    "CREATE TABLE test.primary_only (id INT UNSIGNED NOT NULL PRIMARY KEY)",
    "INSERT INTO test.primary_only (id) VALUES (1)",
    "SET sql_log_bin = 1",
];

const REPLICA_DRIFT: &str = "INSERT INTO test.different_checksum (name) VALUES ('d')";

const CATCH_UP_SECS: u64 = 60;

/// Two containers on a private docker network, the replica following the primary.
pub struct ReplicationPair {
    pub primary: MySQLContainer,
    pub replica: MySQLContainer,
    network: String,
}

impl ReplicationPair {
    /// Starts both containers and waits until they accept connections.
    ///
    /// Containers are named `{prefix}-primary` and `{prefix}-replica`.
    pub async fn start(prefix: &str, primary_port: u16, replica_port: u16) -> Result<Self> {
        let network = format!("{prefix}-net");
        let _ = Command::new("docker")
            .args(["network", "create", &network])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let pair = Self {
            primary: MySQLContainer::new(&format!("{prefix}-primary"), primary_port, 1)
                .with_network(&network),
            replica: MySQLContainer::new(&format!("{prefix}-replica"), replica_port, 2)
                .with_network(&network),
            network,
        };

        pair.primary.start()?;
        pair.replica.start()?;
        pair.primary.wait_until_ready(120).await?;
        pair.replica.wait_until_ready(120).await?;
        Ok(pair)
    }

    /// Configures replication and seeds the fixture tables.
    pub async fn bootstrap(&self) -> Result<()> {
        let mut primary = self.primary.connect().await?;
        let mut replica = self.replica.connect().await?;
        bootstrap_replication(&mut primary, &mut replica, &self.primary.container_name).await?;
        primary.disconnect().await?;
        replica.disconnect().await?;
        Ok(())
    }
}

impl Drop for ReplicationPair {
    fn drop(&mut self) {
        // Containers must be gone before the network can be removed.
        let _ = self.replica.stop();
        let _ = self.primary.stop();
        let _ = Command::new("docker")
            .args(["network", "rm", &self.network])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

/// Sets up replication from `primary` to `replica` and seeds the fixture.
///
/// `primary_host` is the primary's address as seen from the replica. Does
/// nothing if the replica already has replication configured.
pub async fn bootstrap_replication(
    primary: &mut Conn,
    replica: &mut Conn,
    primary_host: &str,
) -> Result<()> {
    let status: Option<Row> = replica
        .query_first("SHOW REPLICA STATUS")
        .await
        .context("Failed to read replica status")?;
    if status.is_some() {
        info!("Replication already configured, skipping bootstrap");
        return Ok(());
    }

    let primary_dialect = dialect_of(primary).await?;
    let replica_dialect = dialect_of(replica).await?;

    let (file, offset) = source_position(primary, &primary_dialect).await?;
    replica
        .query_drop(format!(
            "CHANGE REPLICATION SOURCE TO SOURCE_HOST = {}, SOURCE_PORT = 3306, \
             SOURCE_USER = 'root', SOURCE_PASSWORD = {}, \
             SOURCE_LOG_FILE = {}, SOURCE_LOG_POS = {}, GET_SOURCE_PUBLIC_KEY = 1",
            quote_literal(primary_host),
            quote_literal(ROOT_PASSWORD),
            quote_literal(&file),
            offset
        ))
        .await
        .context("Failed to configure replication")?;
    replica
        .query_drop("START REPLICA")
        .await
        .context("Failed to start replication")?;

    for sql in PRIMARY_SEED.iter().chain(PRIMARY_ONLY) {
        primary
            .query_drop(*sql)
            .await
            .with_context(|| format!("Failed to run on primary: {sql}"))?;
    }

    let (file, offset) = source_position(primary, &primary_dialect).await?;
    let caught_up: Option<Option<i64>> = replica
        .exec_first(
            replica_dialect.wait_query(),
            (file.as_str(), offset, CATCH_UP_SECS),
        )
        .await
        .context("Failed to wait for replica")?;
    match caught_up.flatten() {
        Some(n) if n >= 0 => {}
        other => anyhow::bail!("Replica failed to catch up ({other:?})"),
    }

    replica
        .query_drop(REPLICA_DRIFT)
        .await
        .context("Failed to modify replica")?;

    info!("Replication fixture ready at {}:{}", file, offset);
    Ok(())
}

async fn dialect_of(conn: &mut Conn) -> Result<Dialect> {
    let version = server_version(conn)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to detect server version: {e}"))?;
    Ok(Dialect::for_version(&version))
}

async fn source_position(primary: &mut Conn, dialect: &Dialect) -> Result<(String, u64)> {
    let query = dialect.status_query;
    let row: Option<Row> = primary
        .query_first(query)
        .await
        .context("Failed to read primary status")?;
    let row = row.context("Binary logging is disabled on primary")?;
    let position = read_position(&row, query)?;
    Ok((position.file, position.offset))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}
