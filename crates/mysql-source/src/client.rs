use crate::database::MySQLDatabase;
use crate::dialect::{Dialect, ServerVersion};
use crate::error::MySQLError;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, SslOpts};
use replication_check_core::{BoxError, CheckError, Server, Side};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 3306;

/// Builds driver options for `server`.
pub fn connection_opts(server: &Server) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(server.host())
        .tcp_port(server.port().unwrap_or(DEFAULT_PORT))
        .user(server.user())
        .pass(server.password());

    if let Some(ca) = server.ssl_ca() {
        builder = builder.ssl_opts(SslOpts::default().with_root_certs(vec![ca.to_path_buf().into()]));
    }
    builder
}

/// Opens a dedicated session to `server` and detects its dialect.
///
/// Both the TCP connect and the version query must finish within `timeout`.
pub async fn connect(
    server: &Server,
    side: Side,
    timeout: Duration,
) -> Result<MySQLDatabase, CheckError> {
    let address = server.address();
    debug!("Connecting to {} server {}", side, address);

    let connectivity = |source: BoxError| CheckError::Connectivity {
        side,
        target: address.clone(),
        source,
    };

    let (conn, dialect) = tokio::time::timeout(timeout, open(server))
        .await
        .map_err(|elapsed| connectivity(Box::new(elapsed)))?
        .map_err(connectivity)?;

    info!(
        "Connected to {} server {} ({} / {})",
        side, address, dialect.status_query, dialect.wait_function
    );
    Ok(MySQLDatabase::new(conn, dialect, address))
}

async fn open(server: &Server) -> Result<(Conn, Dialect), BoxError> {
    let mut conn = Conn::new(connection_opts(server)).await?;
    let version = server_version(&mut conn).await?;
    debug!("{} reports {}", server.address(), version);
    Ok((conn, Dialect::for_version(&version)))
}

/// Reads and parses `SELECT VERSION()` on an open session.
pub(crate) async fn server_version(conn: &mut Conn) -> Result<ServerVersion, BoxError> {
    let version: Option<String> = conn.query_first("SELECT VERSION()").await?;
    let version = version.ok_or_else(|| MySQLError::UnknownVersion(String::new()))?;
    Ok(ServerVersion::parse(&version)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::Opts;

    #[test]
    fn test_connection_opts_defaults_port() {
        let server = Server::new("db.internal")
            .with_credentials(Some("checker".to_string()), Some("secret".to_string()));
        let opts = Opts::from(connection_opts(&server));

        assert_eq!(opts.ip_or_hostname(), "db.internal");
        assert_eq!(opts.tcp_port(), 3306);
        assert_eq!(opts.user(), Some("checker"));
        assert_eq!(opts.pass(), Some("secret"));
        assert!(opts.ssl_opts().is_none());
    }

    #[test]
    fn test_connection_opts_with_port_and_ca() {
        let server = Server::new("10.0.0.5")
            .with_port(Some(3307))
            .with_ssl_ca(Some("/etc/mysql/ca.pem".into()));
        let opts = Opts::from(connection_opts(&server));

        assert_eq!(opts.tcp_port(), 3307);
        assert_eq!(opts.user(), None);
        assert!(opts.ssl_opts().is_some());
    }

    #[tokio::test]
    async fn test_connect_failure_is_connectivity_error() {
        // Nothing listens on port 1 of the loopback interface.
        let server = Server::new("127.0.0.1").with_port(Some(1));

        let err = connect(&server, Side::Replica, Duration::from_secs(5))
            .await
            .err()
            .unwrap();

        match err {
            CheckError::Connectivity { side, target, .. } => {
                assert_eq!(side, Side::Replica);
                assert_eq!(target, "127.0.0.1:1");
            }
            other => panic!("expected connectivity error, got {other:?}"),
        }
    }
}
