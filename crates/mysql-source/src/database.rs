//! [`Database`] implementation over a single MySQL session.

use crate::dialect::Dialect;
use crate::error::MySQLError;
use crate::position::BinlogPosition;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use replication_check_core::{
    BoxError, CatalogEntry, Checksum, Database, Table, TableKind, WaitStatus,
};
use std::time::Duration;
use tracing::debug;

/// One connected MySQL or MariaDB server.
///
/// Holds a dedicated [`Conn`] rather than a pool: `LOCK TABLES` and
/// `UNLOCK TABLES` only pair up when issued on the same session.
pub struct MySQLDatabase {
    conn: Conn,
    dialect: Dialect,
    address: String,
}

impl MySQLDatabase {
    pub fn new(conn: Conn, dialect: Dialect, address: impl Into<String>) -> Self {
        Self {
            conn,
            dialect,
            address: address.into(),
        }
    }
}

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Fully qualified, quoted `schema`.`table` reference.
pub fn qualified_name(table: &Table) -> String {
    format!(
        "{}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.name)
    )
}

/// Maps the result of `MASTER_POS_WAIT` / `SOURCE_POS_WAIT`.
///
/// NULL means the replica SQL thread is not running or replication is not
/// configured. -1 means the timeout elapsed. Any other value is the number of
/// events waited for, including 0 when the position was already applied.
pub fn wait_status(result: Option<i64>) -> WaitStatus {
    match result {
        None => WaitStatus::NotReplicating,
        Some(n) if n < 0 => WaitStatus::TimedOut,
        Some(_) => WaitStatus::Reached,
    }
}

pub(crate) fn read_position(row: &Row, query: &'static str) -> Result<BinlogPosition, MySQLError> {
    let file: String = row
        .get_opt("File")
        .ok_or(MySQLError::UnexpectedResult {
            query,
            detail: "missing File column".to_string(),
        })?
        .map_err(|e| MySQLError::UnexpectedResult {
            query,
            detail: e.to_string(),
        })?;
    let offset: u64 = row
        .get_opt("Position")
        .ok_or(MySQLError::UnexpectedResult {
            query,
            detail: "missing Position column".to_string(),
        })?
        .map_err(|e| MySQLError::UnexpectedResult {
            query,
            detail: e.to_string(),
        })?;
    Ok(BinlogPosition::new(file, offset))
}

#[async_trait::async_trait]
impl Database for MySQLDatabase {
    type Position = BinlogPosition;

    async fn list_schemas(&mut self) -> Result<Vec<String>, BoxError> {
        let schemas: Vec<String> = self.conn.query("SHOW DATABASES").await?;
        Ok(schemas)
    }

    async fn list_tables(&mut self, schema: &str) -> Result<Vec<CatalogEntry>, BoxError> {
        let sql = format!("SHOW FULL TABLES FROM {}", quote_identifier(schema));
        let rows: Vec<(String, String)> = self.conn.query(sql).await?;
        Ok(rows
            .into_iter()
            .map(|(name, kind)| CatalogEntry::new(name, TableKind::from_table_type(&kind)))
            .collect())
    }

    async fn lock_table_read(&mut self, table: &Table) -> Result<(), BoxError> {
        let sql = format!("LOCK TABLES {} READ", qualified_name(table));
        self.conn.query_drop(sql).await?;
        Ok(())
    }

    async fn unlock_tables(&mut self) -> Result<(), BoxError> {
        self.conn.query_drop("UNLOCK TABLES").await?;
        Ok(())
    }

    async fn current_position(&mut self) -> Result<BinlogPosition, BoxError> {
        let query = self.dialect.status_query;
        let row: Option<Row> = self.conn.query_first(query).await?;
        let row = row.ok_or(MySQLError::BinlogDisabled)?;
        Ok(read_position(&row, query)?)
    }

    async fn wait_for_position(
        &mut self,
        position: &BinlogPosition,
        timeout: Duration,
    ) -> Result<WaitStatus, BoxError> {
        let seconds = timeout.as_secs().max(1);
        debug!(
            "Waiting up to {}s on {} for {}",
            seconds, self.address, position
        );
        let result: Option<Option<i64>> = self
            .conn
            .exec_first(
                self.dialect.wait_query(),
                (position.file.as_str(), position.offset, seconds),
            )
            .await?;
        Ok(wait_status(result.flatten()))
    }

    async fn checksum_table(&mut self, table: &Table) -> Result<Checksum, BoxError> {
        let sql = format!("CHECKSUM TABLE {}", qualified_name(table));
        let row: Option<(String, Option<u64>)> = self.conn.query_first(sql).await?;
        match row {
            Some((_, Some(checksum))) => Ok(Checksum(checksum)),
            _ => Err(MySQLError::NoChecksum(table.to_string()).into()),
        }
    }

    async fn disconnect(self) -> Result<(), BoxError> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "`orders`");
        assert_eq!(quote_identifier("my`table"), "`my``table`");
        assert_eq!(quote_identifier("with space"), "`with space`");
    }

    #[test]
    fn test_qualified_name() {
        let table = Table::new("shop", "order-items");
        assert_eq!(qualified_name(&table), "`shop`.`order-items`");
    }

    #[test]
    fn test_wait_status_mapping() {
        assert_eq!(wait_status(None), WaitStatus::NotReplicating);
        assert_eq!(wait_status(Some(-1)), WaitStatus::TimedOut);
        assert_eq!(wait_status(Some(0)), WaitStatus::Reached);
        assert_eq!(wait_status(Some(17)), WaitStatus::Reached);
    }
}
