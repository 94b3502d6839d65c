//! Catalog reading: which tables exist on a server.

use crate::database::Database;
use crate::error::{query_failed, CheckError, Operation};
use crate::model::{Side, Table};
use std::collections::HashSet;
use tracing::debug;

/// The engine's own bookkeeping schemas, never checked.
pub const INTERNAL_SCHEMAS: [&str; 4] = ["mysql", "information_schema", "performance_schema", "sys"];

pub fn is_internal_schema(name: &str) -> bool {
    INTERNAL_SCHEMAS.contains(&name)
}

/// Ordered set of checkable tables on one server.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<Table>,
    index: HashSet<Table>,
}

impl Catalog {
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut catalog = Self::default();
        for table in tables {
            if catalog.index.insert(table.clone()) {
                catalog.tables.push(table);
            }
        }
        catalog
    }

    pub fn contains(&self, table: &Table) -> bool {
        self.index.contains(table)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Lists every checkable table on `db`, skipping internal schemas and views.
///
/// Issues read-only metadata queries only. Failures are not retried.
pub async fn read_catalog<D: Database>(db: &mut D, side: Side) -> Result<Catalog, CheckError> {
    let schemas = db
        .list_schemas()
        .await
        .map_err(query_failed(side, Operation::ListSchemas, None))?;

    let mut tables = Vec::new();
    for schema in schemas.into_iter().filter(|s| !is_internal_schema(s)) {
        let entries = db
            .list_tables(&schema)
            .await
            .map_err(query_failed(side, Operation::ListTables, None))?;

        for entry in entries {
            if entry.kind.is_checkable() {
                tables.push(Table::new(schema.clone(), entry.name));
            } else {
                debug!("Skipping view {}.{} on {}", schema, entry.name, side);
            }
        }
    }

    debug!("Found {} checkable tables on {}", tables.len(), side);
    Ok(Catalog::new(tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_journal, FailPoint, MemoryDatabase};

    #[test]
    fn test_catalog_deduplicates_and_keeps_order() {
        let catalog = Catalog::new([
            Table::new("b", "t2"),
            Table::new("a", "t1"),
            Table::new("b", "t2"),
        ]);

        assert_eq!(
            catalog.tables(),
            &[Table::new("b", "t2"), Table::new("a", "t1")]
        );
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(&Table::new("a", "t1")));
    }

    #[tokio::test]
    async fn test_read_catalog_skips_internal_schemas_and_views() {
        let mut db = MemoryDatabase::new("primary", new_journal())
            .with_table("mysql", "user", &[])
            .with_table("information_schema", "TABLES", &[])
            .with_table("performance_schema", "threads", &[])
            .with_table("sys", "sys_config", &[])
            .with_table("shop", "orders", &["1"])
            .with_view("shop", "order_totals")
            .with_table("shop", "customers", &["1"])
            .with_table("blog", "posts", &[]);

        let catalog = read_catalog(&mut db, Side::Primary).await.unwrap();

        assert_eq!(
            catalog.tables(),
            &[
                Table::new("shop", "orders"),
                Table::new("shop", "customers"),
                Table::new("blog", "posts"),
            ]
        );
        assert!(!catalog.contains(&Table::new("shop", "order_totals")));
    }

    #[tokio::test]
    async fn test_read_catalog_surfaces_failures() {
        let mut db = MemoryDatabase::new("replica", new_journal())
            .with_table("shop", "orders", &[])
            .failing_on(FailPoint::ListSchemas);

        let err = read_catalog(&mut db, Side::Replica).await.unwrap_err();

        assert!(matches!(
            err,
            CheckError::Database {
                side: Side::Replica,
                operation: Operation::ListSchemas,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_catalog_empty_server() {
        let mut db = MemoryDatabase::new("primary", new_journal()).with_table("sys", "x", &[]);

        let catalog = read_catalog(&mut db, Side::Primary).await.unwrap();
        assert!(catalog.is_empty());
    }
}
