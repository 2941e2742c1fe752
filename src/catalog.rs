//! Table catalog
//!
//! Maps table names to live tables. Creation and removal are exclusive per
//! name and only hold the map lock long enough to insert or remove the
//! entry; releasing a dropped table's storage happens outside it, so other
//! tables are never blocked by a drop.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{EngineConfig, ResolvedOptions, TableOptions};
use crate::error::{VectorDbError, VectorDbResult};
use crate::schema::{Schema, SchemaDescriptor};
use crate::table::Table;

/// Outcome of [`Catalog::get_or_create`]
#[derive(Debug, Clone)]
pub enum Acquired {
    Created(Arc<Table>),
    Existing(Arc<Table>),
}

impl Acquired {
    pub fn is_created(&self) -> bool {
        matches!(self, Acquired::Created(_))
    }

    pub fn table(&self) -> &Arc<Table> {
        match self {
            Acquired::Created(table) | Acquired::Existing(table) => table,
        }
    }

    pub fn into_table(self) -> Arc<Table> {
        match self {
            Acquired::Created(table) | Acquired::Existing(table) => table,
        }
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    config: EngineConfig,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Catalog {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn create(&self, name: &str, schema: Schema) -> VectorDbResult<Arc<Table>> {
        self.create_with(name, schema, TableOptions::default())
    }

    pub fn create_with(&self, name: &str, schema: Schema, options: TableOptions) -> VectorDbResult<Arc<Table>> {
        check_name(name)?;
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(VectorDbError::TableExists(name.to_string()));
        }
        let table = Arc::new(self.build(name, schema, &options)?);
        tables.insert(name.to_string(), Arc::clone(&table));
        drop(tables);

        info!(
            "Created table {} ({} dims, {}, {})",
            name,
            table.schema().dims(),
            table.schema().metric(),
            table.schema().index_kind()
        );
        Ok(table)
    }

    /// Validates the wire-form schema, then creates the table
    pub fn create_from_descriptor(
        &self,
        name: &str,
        descriptor: SchemaDescriptor,
        options: TableOptions,
    ) -> VectorDbResult<Arc<Table>> {
        self.create_with(name, Schema::try_from(descriptor)?, options)
    }

    /// Returns the existing table when its schema equals `schema`
    pub fn get_or_create(&self, name: &str, schema: Schema, options: TableOptions) -> VectorDbResult<Acquired> {
        check_name(name)?;
        if let Some(existing) = self.tables.read().get(name) {
            return existing_if_same(existing, &schema);
        }

        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(name) {
            return existing_if_same(existing, &schema);
        }
        let table = Arc::new(self.build(name, schema, &options)?);
        tables.insert(name.to_string(), Arc::clone(&table));
        drop(tables);

        info!("Created table {} on first acquisition", name);
        Ok(Acquired::Created(table))
    }

    pub fn get(&self, name: &str) -> VectorDbResult<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| VectorDbError::TableNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    /// Table names in lexicographic order
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Unregisters the table, waits for its in-flight operations, then frees
    /// its rows and index
    pub fn drop_table(&self, name: &str) -> VectorDbResult<()> {
        let table = self
            .tables
            .write()
            .remove(name)
            .ok_or_else(|| VectorDbError::TableNotFound(name.to_string()))?;
        table.release();
        info!("Dropped table {}", name);
        Ok(())
    }

    fn build(&self, name: &str, schema: Schema, options: &TableOptions) -> VectorDbResult<Table> {
        let resolved = ResolvedOptions::resolve(&self.config, options)?;
        Table::new(name, schema, resolved)
    }
}

fn check_name(name: &str) -> VectorDbResult<()> {
    if name.trim().is_empty() {
        return Err(VectorDbError::invalid("table name must be non-empty"));
    }
    Ok(())
}

fn existing_if_same(existing: &Arc<Table>, schema: &Schema) -> VectorDbResult<Acquired> {
    if existing.schema() != schema {
        return Err(VectorDbError::schema(format!(
            "table {} exists with a different schema",
            existing.name()
        )));
    }
    Ok(Acquired::Existing(Arc::clone(existing)))
}
