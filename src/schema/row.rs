//! Row identifiers and the row shapes crossing the table boundary

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Value;

/// Internal row identifier, assigned at insert time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RowId(pub u64);

impl RowId {
    pub fn new(id: u64) -> Self {
        RowId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl From<u64> for RowId {
    fn from(id: u64) -> Self {
        RowId(id)
    }
}

/// A row to insert: the vector plus one value per scalar column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRow {
    pub vector: Vec<f32>,
    pub attributes: HashMap<String, Value>,
}

impl NewRow {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            attributes: HashMap::new(),
        }
    }

    /// Sets a scalar attribute
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }
}

/// A stored row as returned by `scan`
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row_id: RowId,
    /// Scalar attributes in schema order
    pub attributes: IndexMap<String, Value>,
    pub vector: Arc<[f32]>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }
}

/// A search hit joined back to its attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub row_id: RowId,
    /// Scalar attributes in schema order
    pub attributes: IndexMap<String, Value>,
    pub distance: f64,
}

impl RankedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }
}
