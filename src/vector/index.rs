//! Index abstraction shared by the flat and HNSW implementations

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::flat::FlatIndex;
use super::hnsw::{HnswIndex, HnswStats};
use super::metric::DistanceMetric;
use crate::config::HnswParams;
use crate::error::{VectorDbError, VectorDbResult};
use crate::schema::{RowId, VectorSpec};

/// Index implementation selected by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact brute-force scan
    Flat,
    /// Hierarchical navigable small world graph
    Hnsw,
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Flat => "flat",
            IndexKind::Hnsw => "hnsw",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = VectorDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "hnsw" => Ok(IndexKind::Hnsw),
            other => Err(VectorDbError::schema(format!("unknown index kind '{}'", other))),
        }
    }
}

/// A search hit: row id and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row_id: RowId,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(row_id: RowId, distance: f32) -> Self {
        Self { row_id, distance }
    }

    /// Ascending distance, ties broken by ascending row id
    #[inline]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.row_id.cmp(&other.row_id))
    }
}

/// Max-heap entry: the worst-ranked neighbor sits on top
#[derive(Debug, Clone, Copy)]
pub(crate) struct Farthest(pub Neighbor);

impl PartialEq for Farthest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Farthest {}

impl Ord for Farthest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for Farthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Accept-all callback for unfiltered searches
pub fn accept_all(_: RowId) -> bool {
    true
}

/// Nearest-neighbor index over the vector column of one table.
///
/// Implementations are internally synchronized: searches take `&self` and
/// may run concurrently with each other and with `insert`.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    fn kind(&self) -> IndexKind;

    fn dimensions(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// Adds a vector under `row_id`. Fails with `DimensionMismatch` on a length mismatch.
    fn insert(&self, row_id: RowId, vector: Arc<[f32]>) -> VectorDbResult<()>;

    /// Up to `k` nearest rows for which `accept` returns true, sorted by
    /// [`Neighbor::rank_cmp`]. `ef` overrides the index's default search width.
    fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
        accept: &dyn Fn(RowId) -> bool,
    ) -> VectorDbResult<Vec<Neighbor>>;

    /// Tombstones `row_id`; returns false if it was absent or already removed
    fn remove(&self, row_id: RowId) -> bool;

    /// Number of live (non-tombstoned) vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tombstones(&self) -> usize;

    /// Releases all vectors and graph state
    fn clear(&self);

    fn hnsw_stats(&self) -> Option<HnswStats> {
        None
    }
}

/// Builds the index matching a schema's vector column
pub fn build_index(spec: &VectorSpec, params: HnswParams, seed: Option<u64>) -> Box<dyn VectorIndex> {
    match spec.index {
        IndexKind::Flat => Box::new(FlatIndex::new(spec.dims, spec.metric)),
        IndexKind::Hnsw => {
            let index = match seed {
                Some(seed) => HnswIndex::with_seed(spec.dims, spec.metric, params, seed),
                None => HnswIndex::new(spec.dims, spec.metric, params),
            };
            Box::new(index)
        }
    }
}
