//! Client handles
//!
//! [`Client`] is the explicit handle every operation goes through; clones
//! share one catalog. [`AsyncClient`] runs the same operations on tokio's
//! blocking pool.

use std::sync::Arc;

use crate::catalog::{Acquired, Catalog};
use crate::config::{EngineConfig, TableOptions};
use crate::error::VectorDbResult;
use crate::query::{Predicate, QueryEngine, SearchRequest};
use crate::schema::{NewRow, RankedRow, Record, Schema, SchemaDescriptor};
use crate::table::{Table, TableStats};

#[derive(Debug, Clone)]
pub struct Client {
    catalog: Arc<Catalog>,
    engine: QueryEngine,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Client {
    pub fn new(config: EngineConfig) -> Self {
        let engine = QueryEngine::from_config(&config);
        Self {
            catalog: Arc::new(Catalog::new(config)),
            engine,
        }
    }

    /// Handle over an existing catalog
    pub fn with_catalog(catalog: Arc<Catalog>) -> Self {
        let engine = QueryEngine::from_config(catalog.config());
        Self { catalog, engine }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> VectorDbResult<Arc<Table>> {
        self.catalog.create(name, schema)
    }

    pub fn create_table_with(&self, name: &str, schema: Schema, options: TableOptions) -> VectorDbResult<Arc<Table>> {
        self.catalog.create_with(name, schema, options)
    }

    pub fn create_table_from_descriptor(
        &self,
        name: &str,
        descriptor: SchemaDescriptor,
    ) -> VectorDbResult<Arc<Table>> {
        self.catalog.create_from_descriptor(name, descriptor, TableOptions::default())
    }

    pub fn get_or_create_table(&self, name: &str, schema: Schema) -> VectorDbResult<Acquired> {
        self.catalog.get_or_create(name, schema, TableOptions::default())
    }

    pub fn get_table(&self, name: &str) -> VectorDbResult<Arc<Table>> {
        self.catalog.get(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.list()
    }

    pub fn drop_table(&self, name: &str) -> VectorDbResult<()> {
        self.catalog.drop_table(name)
    }

    /// Inserts a batch; returns the number of rows stored
    pub fn insert(&self, table: &str, rows: Vec<NewRow>) -> VectorDbResult<usize> {
        Ok(self.catalog.get(table)?.insert_batch(rows)?.len())
    }

    pub fn scan(&self, table: &str, filter: Option<&Predicate>) -> VectorDbResult<Vec<Record>> {
        self.engine.scan(&*self.catalog.get(table)?, filter)
    }

    pub fn search(
        &self,
        table: &str,
        queries: &[Vec<f32>],
        k: usize,
        filter: Option<&Predicate>,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        self.engine.search(&*self.catalog.get(table)?, queries, k, filter)
    }

    pub fn search_with(
        &self,
        table: &str,
        queries: &[Vec<f32>],
        request: &SearchRequest,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        self.engine.search_with(&*self.catalog.get(table)?, queries, request)
    }

    pub fn delete(&self, table: &str, filter: &Predicate) -> VectorDbResult<usize> {
        self.catalog.get(table)?.delete(filter)
    }

    pub fn stats(&self, table: &str) -> VectorDbResult<TableStats> {
        self.catalog.get(table)?.stats()
    }
}

/// Async facade over [`Client`]; each call runs on `spawn_blocking`
#[derive(Debug, Clone, Default)]
pub struct AsyncClient {
    inner: Client,
}

impl From<Client> for AsyncClient {
    fn from(inner: Client) -> Self {
        Self { inner }
    }
}

impl AsyncClient {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Client::new(config),
        }
    }

    pub fn blocking(&self) -> &Client {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> VectorDbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> VectorDbResult<T> + Send + 'static,
    {
        let client = self.inner.clone();
        match tokio::task::spawn_blocking(move || op(&client)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => panic!("blocking vector task did not complete: {}", e),
        }
    }

    pub async fn create_table(&self, name: impl Into<String>, schema: Schema) -> VectorDbResult<Arc<Table>> {
        let name = name.into();
        self.run(move |c| c.create_table(&name, schema)).await
    }

    pub async fn get_or_create_table(&self, name: impl Into<String>, schema: Schema) -> VectorDbResult<Acquired> {
        let name = name.into();
        self.run(move |c| c.get_or_create_table(&name, schema)).await
    }

    pub async fn get_table(&self, name: impl Into<String>) -> VectorDbResult<Arc<Table>> {
        let name = name.into();
        self.run(move |c| c.get_table(&name)).await
    }

    pub async fn list_tables(&self) -> Vec<String> {
        self.inner.list_tables()
    }

    pub async fn drop_table(&self, name: impl Into<String>) -> VectorDbResult<()> {
        let name = name.into();
        self.run(move |c| c.drop_table(&name)).await
    }

    pub async fn insert(&self, table: impl Into<String>, rows: Vec<NewRow>) -> VectorDbResult<usize> {
        let table = table.into();
        self.run(move |c| c.insert(&table, rows)).await
    }

    pub async fn scan(&self, table: impl Into<String>, filter: Option<Predicate>) -> VectorDbResult<Vec<Record>> {
        let table = table.into();
        self.run(move |c| c.scan(&table, filter.as_ref())).await
    }

    pub async fn search(
        &self,
        table: impl Into<String>,
        queries: Vec<Vec<f32>>,
        request: SearchRequest,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        let table = table.into();
        self.run(move |c| c.search_with(&table, &queries, &request)).await
    }

    pub async fn delete(&self, table: impl Into<String>, filter: Predicate) -> VectorDbResult<usize> {
        let table = table.into();
        self.run(move |c| c.delete(&table, &filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VectorDbError;
    use crate::schema::{ScalarType, Value};
    use crate::vector::{DistanceMetric, IndexKind};

    fn schema() -> Schema {
        Schema::builder()
            .scalar("name", ScalarType::String)
            .vector("v", 2, DistanceMetric::L2, IndexKind::Flat)
            .build()
            .unwrap()
    }

    #[test]
    fn test_clones_share_catalog() {
        let client = Client::default();
        let other = client.clone();
        client.create_table("t", schema()).unwrap();
        assert_eq!(other.list_tables(), vec!["t"]);
    }

    #[test]
    fn test_client_operations() {
        let client = Client::default();
        client.create_table("t", schema()).unwrap();
        let rows = vec![
            NewRow::new(vec![0.0, 0.0]).with("name", "a"),
            NewRow::new(vec![3.0, 4.0]).with("name", "b"),
        ];
        assert_eq!(client.insert("t", rows).unwrap(), 2);

        let hits = client.search("t", &[vec![3.0, 4.0]], 1, None).unwrap();
        assert_eq!(hits[0][0].get("name"), Some(&Value::from("b")));
        assert_eq!(hits[0][0].distance, 0.0);

        assert_eq!(client.delete("t", &Predicate::eq("name", "a")).unwrap(), 1);
        assert_eq!(client.scan("t", None).unwrap().len(), 1);
        assert_eq!(client.stats("t").unwrap().rows, 1);

        client.drop_table("t").unwrap();
        assert!(matches!(client.scan("t", None), Err(VectorDbError::TableNotFound(_))));
        assert!(matches!(client.insert("t", vec![]), Err(VectorDbError::TableNotFound(_))));
    }
}
