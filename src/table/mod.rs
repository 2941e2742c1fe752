//! Table storage
//!
//! A table owns its schema, the row map and one vector index. Locking, from
//! outermost to innermost:
//!
//! - `lifecycle`: every operation holds it shared for its whole duration;
//!   `release` takes it exclusively, so it waits for in-flight work and
//!   everything after it sees a dead table.
//! - `writer`: serializes `insert_batch` and `delete`, and guards the row-id
//!   counter and the key map.
//! - `rows`: written only to publish or remove rows; searches hold it shared
//!   while they walk the index.
//!
//! Inserted vectors are linked into the index before their rows are
//! published, and searches only return published rows, so a reader never
//! sees a row whose vector is not yet reachable.

mod key;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ResolvedOptions;
use crate::error::{check_dims, VectorDbError, VectorDbResult};
use crate::query::{BoundPredicate, Predicate};
use crate::schema::{NewRow, RankedRow, Record, RowId, Schema, Value};
use crate::vector::{build_index, HnswStats, IndexKind, VectorIndex};
use key::RowKey;

/// Point-in-time table statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    /// Live rows
    pub rows: usize,
    /// Deleted or overwritten rows still occupying index slots
    pub tombstones: usize,
    pub index_kind: IndexKind,
    pub hnsw: Option<HnswStats>,
}

#[derive(Debug)]
struct StoredRow {
    values: Vec<Value>,
    vector: Arc<[f32]>,
}

#[derive(Debug, Default)]
struct WriterState {
    next_id: u64,
    keys: HashMap<RowKey, RowId>,
}

#[derive(Debug)]
pub struct Table {
    name: String,
    schema: Arc<Schema>,
    /// Key column slot when duplicates are rejected
    key_slot: Option<usize>,
    lifecycle: RwLock<bool>,
    writer: Mutex<WriterState>,
    rows: RwLock<BTreeMap<RowId, StoredRow>>,
    index: Box<dyn VectorIndex>,
}

impl Table {
    pub(crate) fn new(name: impl Into<String>, schema: Schema, options: ResolvedOptions) -> VectorDbResult<Self> {
        let key_slot = match &options.key_column {
            Some(column) => {
                let (slot, _) = schema.scalar_slot(column).ok_or_else(|| {
                    VectorDbError::schema(format!("key column '{}' is not a scalar column", column))
                })?;
                Some(slot)
            }
            None if !options.allow_duplicates => {
                if schema.scalar_columns().is_empty() {
                    return Err(VectorDbError::schema(
                        "rejecting duplicates requires at least one scalar column as key",
                    ));
                }
                Some(0)
            }
            None => None,
        };

        let index = build_index(&schema.vector_spec(), options.hnsw, options.seed);
        Ok(Self {
            name: name.into(),
            schema: Arc::new(schema),
            key_slot: if options.allow_duplicates { None } else { key_slot },
            lifecycle: RwLock::new(true),
            writer: Mutex::new(WriterState::default()),
            rows: RwLock::new(BTreeMap::new()),
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether duplicate keys overwrite instead of appending
    pub fn rejects_duplicates(&self) -> bool {
        self.key_slot.is_some()
    }

    fn live(&self, op: &str) -> VectorDbResult<RwLockReadGuard<'_, bool>> {
        let alive = self.lifecycle.read();
        if !*alive {
            warn!("{} on dropped table {}", op, self.name);
            return Err(VectorDbError::TableNotFound(self.name.clone()));
        }
        Ok(alive)
    }

    pub fn insert(&self, row: NewRow) -> VectorDbResult<Option<RowId>> {
        Ok(self.insert_batch(vec![row])?.pop())
    }

    /// Validates every row, then stores them all; on error nothing is stored.
    ///
    /// Returns the ids of the stored rows in input order. When duplicates
    /// are rejected, a row superseded by a later row of the same batch is
    /// not stored.
    pub fn insert_batch(&self, rows: Vec<NewRow>) -> VectorDbResult<Vec<RowId>> {
        let _alive = self.live("insert")?;
        for row in &rows {
            self.schema.check_row(row)?;
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = self.writer.lock();
        let prepared: Vec<_> = rows.into_iter().map(|row| self.schema.into_parts(row)).collect();
        let keep = self.batch_winners(&prepared);

        let mut staged = Vec::with_capacity(prepared.len());
        for ((vector, values), keep) in prepared.into_iter().zip(keep) {
            if !keep {
                continue;
            }
            let row_id = RowId::new(writer.next_id);
            writer.next_id += 1;
            if let Err(e) = self.index.insert(row_id, Arc::clone(&vector)) {
                for (staged_id, _) in &staged {
                    self.index.remove(*staged_id);
                }
                return Err(e);
            }
            staged.push((row_id, StoredRow { values, vector }));
        }

        let ids: Vec<RowId> = staged.iter().map(|(id, _)| *id).collect();
        let mut replaced = Vec::new();
        {
            let mut stored = self.rows.write();
            for (row_id, row) in staged {
                if let Some(key) = self.key_of(&row.values) {
                    if let Some(old) = writer.keys.insert(key, row_id) {
                        stored.remove(&old);
                        replaced.push(old);
                    }
                }
                stored.insert(row_id, row);
            }
        }
        for old in &replaced {
            self.index.remove(*old);
        }

        debug!(
            "Inserted {} rows into {} ({} overwritten)",
            ids.len(),
            self.name,
            replaced.len()
        );
        Ok(ids)
    }

    fn key_of(&self, values: &[Value]) -> Option<RowKey> {
        self.key_slot.and_then(|slot| RowKey::from_value(&values[slot]))
    }

    /// Marks which rows of a batch survive the last-wins rule
    fn batch_winners(&self, prepared: &[(Arc<[f32]>, Vec<Value>)]) -> Vec<bool> {
        if self.key_slot.is_none() {
            return vec![true; prepared.len()];
        }
        let mut last = HashMap::new();
        for (position, (_, values)) in prepared.iter().enumerate() {
            if let Some(key) = self.key_of(values) {
                last.insert(key, position);
            }
        }
        prepared
            .iter()
            .enumerate()
            .map(|(position, (_, values))| match self.key_of(values) {
                Some(key) => last.get(&key) == Some(&position),
                None => true,
            })
            .collect()
    }

    /// Rows in ascending row-id order, optionally filtered
    pub fn scan(&self, filter: Option<&Predicate>) -> VectorDbResult<Vec<Record>> {
        let _alive = self.live("scan")?;
        let filter = filter.map(|p| p.bind(&self.schema)).transpose()?;
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(_, row)| filter.as_ref().map_or(true, |f| f.matches(&row.values)))
            .map(|(row_id, row)| Record {
                row_id: *row_id,
                attributes: self.attributes(&row.values),
                vector: Arc::clone(&row.vector),
            })
            .collect())
    }

    /// Logically deletes matching rows; returns how many were removed
    pub fn delete(&self, filter: &Predicate) -> VectorDbResult<usize> {
        let _alive = self.live("delete")?;
        let filter = filter.bind(&self.schema)?;
        let mut writer = self.writer.lock();

        let removed: Vec<(RowId, StoredRow)> = {
            let mut stored = self.rows.write();
            let doomed: Vec<RowId> = stored
                .iter()
                .filter(|(_, row)| filter.matches(&row.values))
                .map(|(id, _)| *id)
                .collect();
            doomed
                .into_iter()
                .filter_map(|id| stored.remove(&id).map(|row| (id, row)))
                .collect()
        };

        for (row_id, row) in &removed {
            self.index.remove(*row_id);
            if let Some(key) = self.key_of(&row.values) {
                if writer.keys.get(&key) == Some(row_id) {
                    writer.keys.remove(&key);
                }
            }
        }

        debug!("Deleted {} rows from {}", removed.len(), self.name);
        Ok(removed.len())
    }

    pub fn count(&self) -> VectorDbResult<usize> {
        let _alive = self.live("count")?;
        Ok(self.rows.read().len())
    }

    pub fn stats(&self) -> VectorDbResult<TableStats> {
        let _alive = self.live("stats")?;
        Ok(TableStats {
            rows: self.rows.read().len(),
            tombstones: self.index.tombstones(),
            index_kind: self.index.kind(),
            hnsw: self.index.hnsw_stats(),
        })
    }

    pub fn is_dropped(&self) -> bool {
        !*self.lifecycle.read()
    }

    /// Waits for in-flight operations, then frees rows and index state.
    /// Returns false if the table was already released.
    pub(crate) fn release(&self) -> bool {
        let mut alive = self.lifecycle.write();
        if !*alive {
            return false;
        }
        *alive = false;
        self.writer.lock().keys.clear();
        self.rows.write().clear();
        self.index.clear();
        true
    }

    /// Shared view for a batch of searches; the table stays alive while it exists
    pub(crate) fn read_view(&self) -> VectorDbResult<TableView<'_>> {
        Ok(TableView {
            table: self,
            _alive: self.live("search")?,
        })
    }

    fn attributes(&self, values: &[Value]) -> IndexMap<String, Value> {
        self.schema
            .scalar_columns()
            .iter()
            .zip(values)
            .map(|((name, _), value)| (name.clone(), value.clone()))
            .collect()
    }
}

pub(crate) struct TableView<'a> {
    table: &'a Table,
    _alive: RwLockReadGuard<'a, bool>,
}

impl TableView<'_> {
    pub fn schema(&self) -> &Schema {
        &self.table.schema
    }

    /// Nearest published rows to `query` that pass `filter`
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
        filter: Option<&BoundPredicate>,
    ) -> VectorDbResult<Vec<RankedRow>> {
        check_dims(self.table.schema.dims(), query.len())?;
        let rows = self.table.rows.read();
        let accept = |row_id: RowId| {
            rows.get(&row_id)
                .map_or(false, |row| filter.map_or(true, |f| f.matches(&row.values)))
        };
        let hits = self.table.index.search(query, k, ef, &accept)?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                rows.get(&hit.row_id).map(|row| RankedRow {
                    row_id: hit.row_id,
                    attributes: self.table.attributes(&row.values),
                    distance: hit.distance as f64,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, TableOptions};
    use crate::schema::ScalarType;
    use crate::vector::DistanceMetric;

    fn table(index: IndexKind, options: TableOptions) -> Table {
        let schema = Schema::builder()
            .scalar("title", ScalarType::String)
            .scalar("page", ScalarType::Integer)
            .vector("embedding", 3, DistanceMetric::L2, index)
            .build()
            .unwrap();
        let options = ResolvedOptions::resolve(&EngineConfig::default(), &options.seed(7)).unwrap();
        Table::new("docs", schema, options).unwrap()
    }

    fn row(title: &str, page: i64, vector: [f32; 3]) -> NewRow {
        NewRow::new(vector.to_vec()).with("title", title).with("page", page)
    }

    #[test]
    fn test_insert_and_scan() {
        let table = table(IndexKind::Flat, TableOptions::default());
        let ids = table
            .insert_batch(vec![row("a", 1, [0.0, 0.0, 0.0]), row("b", 2, [1.0, 0.0, 0.0])])
            .unwrap();
        assert_eq!(ids, vec![RowId::new(0), RowId::new(1)]);

        let records = table.scan(None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("title"), Some(&Value::from("b")));
        assert_eq!(&records[1].vector[..], &[1.0, 0.0, 0.0]);
        let keys: Vec<_> = records[0].attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["title", "page"]);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let table = table(IndexKind::Hnsw, TableOptions::default());
        let bad = NewRow::new(vec![0.0; 3]).with("title", "x").with("page", "not a number");
        let result = table.insert_batch(vec![row("a", 1, [0.0; 3]), bad]);
        assert!(matches!(result, Err(VectorDbError::SchemaValidation(_))));

        let short = NewRow::new(vec![0.0; 2]).with("title", "x").with("page", 1i64);
        let result = table.insert_batch(vec![row("a", 1, [0.0; 3]), short]);
        assert!(matches!(result, Err(VectorDbError::DimensionMismatch { expected: 3, got: 2 })));

        assert_eq!(table.count().unwrap(), 0);
        assert_eq!(table.stats().unwrap().hnsw.unwrap().nodes, 0);
    }

    #[test]
    fn test_scan_filter_and_delete() {
        let table = table(IndexKind::Flat, TableOptions::default());
        table
            .insert_batch((0..10).map(|i| row("t", i, [i as f32, 0.0, 0.0])).collect())
            .unwrap();

        let filter = Predicate::parse("page >= 7").unwrap();
        assert_eq!(table.scan(Some(&filter)).unwrap().len(), 3);
        assert_eq!(table.delete(&filter).unwrap(), 3);
        assert_eq!(table.count().unwrap(), 7);
        assert_eq!(table.stats().unwrap().tombstones, 3);

        let view = table.read_view().unwrap();
        let hits = view.search(&[9.0, 0.0, 0.0], 1, None, None).unwrap();
        assert_eq!(hits[0].get("page"), Some(&Value::Integer(6)));
    }

    #[test]
    fn test_search_filter_uses_index_accept() {
        let table = table(IndexKind::Hnsw, TableOptions::default());
        table
            .insert_batch((0..50).map(|i| row("t", i % 5, [i as f32, 0.0, 0.0])).collect())
            .unwrap();
        let filter = Predicate::eq("page", 3i64).bind(table.schema()).unwrap();
        let view = table.read_view().unwrap();
        let hits = view.search(&[0.0, 0.0, 0.0], 4, Some(100), Some(&filter)).unwrap();
        let pages: Vec<_> = hits.iter().map(|h| h.get("page").cloned()).collect();
        assert_eq!(pages, vec![Some(Value::Integer(3)); 4]);
        assert_eq!(hits[0].distance, 9.0);
    }

    #[test]
    fn test_duplicate_policy_overwrites() {
        let table = table(IndexKind::Flat, TableOptions::default().allow_duplicates(false));
        assert!(table.rejects_duplicates());
        table.insert_batch(vec![row("a", 1, [0.0; 3]), row("b", 1, [1.0; 3])]).unwrap();
        let ids = table
            .insert_batch(vec![row("a", 2, [2.0; 3]), row("c", 1, [3.0; 3]), row("a", 3, [4.0; 3])])
            .unwrap();
        assert_eq!(ids.len(), 2);

        let records = table.scan(None).unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.get("title").cloned(), r.get("page").cloned()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some(Value::from("b")), Some(Value::Integer(1))),
                (Some(Value::from("c")), Some(Value::Integer(1))),
                (Some(Value::from("a")), Some(Value::Integer(3))),
            ]
        );
        assert_eq!(table.stats().unwrap().tombstones, 1);
    }

    #[test]
    fn test_null_keys_never_collide() {
        let table = table(IndexKind::Flat, TableOptions::default().allow_duplicates(false));
        let null_row = || NewRow::new(vec![0.0; 3]).with("title", Value::Null).with("page", 1i64);
        table.insert_batch(vec![null_row(), null_row()]).unwrap();
        assert_eq!(table.count().unwrap(), 2);
    }

    #[test]
    fn test_key_column_option() {
        let table = table(
            IndexKind::Flat,
            TableOptions::default().allow_duplicates(false).key_column("page"),
        );
        table.insert_batch(vec![row("a", 1, [0.0; 3]), row("b", 1, [1.0; 3])]).unwrap();
        let records = table.scan(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("title"), Some(&Value::from("b")));
    }

    #[test]
    fn test_invalid_key_column() {
        let schema = Schema::builder()
            .vector("embedding", 3, DistanceMetric::L2, IndexKind::Flat)
            .build()
            .unwrap();
        let engine = EngineConfig::default();
        let missing = ResolvedOptions::resolve(&engine, &TableOptions::default().key_column("nope")).unwrap();
        assert!(matches!(
            Table::new("t", schema.clone(), missing),
            Err(VectorDbError::SchemaValidation(_))
        ));
        let no_scalars = ResolvedOptions::resolve(&engine, &TableOptions::default().allow_duplicates(false)).unwrap();
        assert!(matches!(
            Table::new("t", schema, no_scalars),
            Err(VectorDbError::SchemaValidation(_))
        ));
    }

    #[test]
    fn test_release() {
        let table = table(IndexKind::Hnsw, TableOptions::default());
        table.insert(row("a", 1, [0.0; 3])).unwrap();
        assert!(table.release());
        assert!(!table.release());
        assert!(table.is_dropped());
        assert!(matches!(table.scan(None), Err(VectorDbError::TableNotFound(_))));
        assert!(matches!(table.count(), Err(VectorDbError::TableNotFound(_))));
        assert!(matches!(
            table.insert(row("b", 1, [0.0; 3])),
            Err(VectorDbError::TableNotFound(_))
        ));
        assert!(table.read_view().is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = table(IndexKind::Hnsw, TableOptions::default());
        assert!(table.scan(None).unwrap().is_empty());
        let view = table.read_view().unwrap();
        assert!(view.search(&[0.0; 3], 5, None, None).unwrap().is_empty());
        assert!(table.insert_batch(Vec::new()).unwrap().is_empty());
    }
}
