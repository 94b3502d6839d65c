//! Docker container management for MySQL testing

use crate::client::connection_opts;
use anyhow::{Context, Result};
use mysql_async::prelude::*;
use mysql_async::Conn;
use replication_check_core::Server;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const ROOT_PASSWORD: &str = "testpass";

/// Configuration for a test MySQL container
pub struct MySQLContainer {
    /// Container name, also its host name on the docker network
    pub container_name: String,
    /// Host port to bind to
    pub host_port: u16,
    /// Image name; the fixture statements follow whatever version it reports
    pub image_name: String,
    /// Replication server id, unique per container in a topology
    pub server_id: u32,
    /// Docker network to attach to
    pub network: Option<String>,
}

impl MySQLContainer {
    /// Creates a new MySQL container configuration
    pub fn new(container_name: &str, host_port: u16, server_id: u32) -> Self {
        Self {
            container_name: container_name.to_string(),
            host_port,
            image_name: "mysql:8.0".to_string(),
            server_id,
            network: None,
        }
    }

    pub fn with_network(mut self, network: &str) -> Self {
        self.network = Some(network.to_string());
        self
    }

    /// Connection target for this container as seen from the host.
    pub fn server(&self) -> Server {
        Server::new("127.0.0.1")
            .with_port(Some(self.host_port))
            .with_credentials(Some("root".to_string()), Some(ROOT_PASSWORD.to_string()))
    }

    /// Starts the MySQL container with binary logging enabled
    pub fn start(&self) -> Result<()> {
        info!("Starting MySQL container: {}", self.container_name);

        // First, try to stop and remove any existing container with the same name
        let _ = Command::new("docker")
            .args(["rm", "-f", &self.container_name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            self.container_name.clone(),
            "-e".to_string(),
            format!("MYSQL_ROOT_PASSWORD={ROOT_PASSWORD}"),
            "-p".to_string(),
            format!("{}:3306", self.host_port),
        ];
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        args.extend([
            "-d".to_string(),
            self.image_name.clone(),
            format!("--server-id={}", self.server_id),
            "--log-bin=mysql-bin".to_string(),
            "--binlog-format=ROW".to_string(),
        ]);

        let output = Command::new("docker")
            .args(&args)
            .output()
            .context("Failed to start Docker container")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to start container: {stderr}");
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Started container: {}", container_id);

        Ok(())
    }

    /// Waits for MySQL to be ready to accept connections
    pub async fn wait_until_ready(&self, timeout_secs: u64) -> Result<()> {
        info!("Waiting for {} to be ready...", self.container_name);

        let start = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);

        while start.elapsed() < timeout {
            match self.test_connection().await {
                Ok(_) => {
                    info!("{} is ready!", self.container_name);
                    return Ok(());
                }
                Err(e) => {
                    debug!("Connection attempt failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
            }
        }

        let logs = self
            .logs()
            .unwrap_or_else(|e| format!("(container logs unavailable: {e:#})"));
        anyhow::bail!(
            "{} did not become ready within {timeout_secs} seconds\n{logs}",
            self.container_name
        )
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        let _: Option<i32> = conn
            .query_first("SELECT 1")
            .await
            .context("Failed to execute test query")?;
        conn.disconnect().await.context("Failed to disconnect")?;
        Ok(())
    }

    /// Opens a root session on the container
    pub async fn connect(&self) -> Result<Conn> {
        Conn::new(connection_opts(&self.server()))
            .await
            .context("Failed to connect")
    }

    /// Stops and removes the container
    pub fn stop(&self) -> Result<()> {
        info!("Stopping container: {}", self.container_name);

        let output = Command::new("docker")
            .args(["rm", "-f", &self.container_name])
            .output()
            .context("Failed to remove container")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("Failed to remove container (may not exist): {}", stderr);
        }

        Ok(())
    }

    /// Last lines of the server log; mysqld writes its log to stderr.
    fn logs(&self) -> Result<String> {
        let output = Command::new("docker")
            .args(["logs", "--tail", "50", &self.container_name])
            .output()
            .context("Failed to read container logs")?;

        Ok(format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

impl Drop for MySQLContainer {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = self.stop();
    }
}
