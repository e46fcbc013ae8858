//! The catalog: the in-process registry of table schemas, assigning each
//! table a stable [`vgraph_types::TableId`] at creation time.

use std::collections::HashMap;

use parking_lot::RwLock;
use vgraph_error::{ExecError, Result};
use vgraph_types::{LogicalType, TableId};

#[derive(Debug, Clone)]
pub struct NodeTableSchema {
    pub table_id: TableId,
    pub name: String,
    pub properties: Vec<(String, LogicalType)>,
}

#[derive(Debug, Clone)]
pub struct RelTableSchema {
    pub table_id: TableId,
    pub name: String,
    pub src_table_id: TableId,
    pub dst_table_id: TableId,
    pub properties: Vec<(String, LogicalType)>,
}

pub trait Catalog: Send + Sync {
    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Catalog`] if `name` is already
    /// registered.
    fn create_node_table(
        &self,
        name: &str,
        properties: Vec<(String, LogicalType)>,
    ) -> Result<TableId>;

    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Catalog`] if `name` is already
    /// registered, or if `src_table`/`dst_table` are not node tables.
    fn create_rel_table(
        &self,
        name: &str,
        src_table: TableId,
        dst_table: TableId,
        properties: Vec<(String, LogicalType)>,
    ) -> Result<TableId>;

    fn node_table_schema(&self, table_id: TableId) -> Result<NodeTableSchema>;
    fn rel_table_schema(&self, table_id: TableId) -> Result<RelTableSchema>;
    fn resolve_node_table(&self, name: &str) -> Result<TableId>;
    fn resolve_rel_table(&self, name: &str) -> Result<TableId>;
}

#[derive(Default)]
struct CatalogInner {
    next_table_id: TableId,
    names: HashMap<String, TableId>,
    node_tables: HashMap<TableId, NodeTableSchema>,
    rel_tables: HashMap<TableId, RelTableSchema>,
}

/// A process-local catalog backed by a single `RwLock`. Schema changes
/// (`CREATE TABLE`) are rare relative to reads, so a single lock is
/// sufficient for the scale this execution core targets.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogInner>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for InMemoryCatalog {
    fn create_node_table(
        &self,
        name: &str,
        properties: Vec<(String, LogicalType)>,
    ) -> Result<TableId> {
        let mut inner = self.inner.write();
        if inner.names.contains_key(name) {
            return Err(ExecError::catalog(format!("table {name} already exists")));
        }
        let table_id = inner.next_table_id;
        inner.next_table_id += 1;
        inner.names.insert(name.to_string(), table_id);
        inner.node_tables.insert(
            table_id,
            NodeTableSchema {
                table_id,
                name: name.to_string(),
                properties,
            },
        );
        Ok(table_id)
    }

    fn create_rel_table(
        &self,
        name: &str,
        src_table: TableId,
        dst_table: TableId,
        properties: Vec<(String, LogicalType)>,
    ) -> Result<TableId> {
        let mut inner = self.inner.write();
        if inner.names.contains_key(name) {
            return Err(ExecError::catalog(format!("table {name} already exists")));
        }
        if !inner.node_tables.contains_key(&src_table) || !inner.node_tables.contains_key(&dst_table) {
            return Err(ExecError::catalog(format!(
                "rel table {name} references an unknown node table"
            )));
        }
        let table_id = inner.next_table_id;
        inner.next_table_id += 1;
        inner.names.insert(name.to_string(), table_id);
        inner.rel_tables.insert(
            table_id,
            RelTableSchema {
                table_id,
                name: name.to_string(),
                src_table_id: src_table,
                dst_table_id: dst_table,
                properties,
            },
        );
        Ok(table_id)
    }

    fn node_table_schema(&self, table_id: TableId) -> Result<NodeTableSchema> {
        self.inner
            .read()
            .node_tables
            .get(&table_id)
            .cloned()
            .ok_or_else(|| ExecError::catalog(format!("no node table with id {table_id}")))
    }

    fn rel_table_schema(&self, table_id: TableId) -> Result<RelTableSchema> {
        self.inner
            .read()
            .rel_tables
            .get(&table_id)
            .cloned()
            .ok_or_else(|| ExecError::catalog(format!("no rel table with id {table_id}")))
    }

    fn resolve_node_table(&self, name: &str) -> Result<TableId> {
        let inner = self.inner.read();
        let table_id = *inner
            .names
            .get(name)
            .ok_or_else(|| ExecError::catalog(format!("no table named {name}")))?;
        if inner.node_tables.contains_key(&table_id) {
            Ok(table_id)
        } else {
            Err(ExecError::catalog(format!("{name} is not a node table")))
        }
    }

    fn resolve_rel_table(&self, name: &str) -> Result<TableId> {
        let inner = self.inner.read();
        let table_id = *inner
            .names
            .get(name)
            .ok_or_else(|| ExecError::catalog(format!("no table named {name}")))?;
        if inner.rel_tables.contains_key(&table_id) {
            Ok(table_id)
        } else {
            Err(ExecError::catalog(format!("{name} is not a rel table")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_table_name_is_rejected() {
        let catalog = InMemoryCatalog::new();
        catalog.create_node_table("Person", vec![]).unwrap();
        assert!(catalog.create_node_table("Person", vec![]).is_err());
    }

    #[test]
    fn rel_table_must_reference_existing_node_tables() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.create_rel_table("Knows", 0, 1, vec![]).is_err());
    }

    #[test]
    fn resolve_round_trips_through_create() {
        let catalog = InMemoryCatalog::new();
        let person = catalog
            .create_node_table("Person", vec![("name".into(), LogicalType::String)])
            .unwrap();
        let knows = catalog
            .create_rel_table("Knows", person, person, vec![])
            .unwrap();
        assert_eq!(catalog.resolve_node_table("Person").unwrap(), person);
        assert_eq!(catalog.resolve_rel_table("Knows").unwrap(), knows);
    }
}
