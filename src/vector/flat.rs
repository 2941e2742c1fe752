//! Exact brute-force index
//!
//! Scans every stored vector on each query. This is the reference the HNSW
//! index is validated against.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BinaryHeap;
use std::sync::Arc;

use super::index::{Farthest, IndexKind, Neighbor, VectorIndex};
use super::metric::DistanceMetric;
use crate::error::{check_dims, VectorDbResult};
use crate::schema::RowId;

#[derive(Debug, Default)]
struct FlatInner {
    ids: Vec<RowId>,
    vectors: Vec<Arc<[f32]>>,
    removed: Vec<bool>,
    positions: FxHashMap<RowId, usize>,
    tombstones: usize,
}

/// Brute-force nearest-neighbor index
#[derive(Debug)]
pub struct FlatIndex {
    dimensions: usize,
    metric: DistanceMetric,
    inner: RwLock<FlatInner>,
}

impl FlatIndex {
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            inner: RwLock::new(FlatInner::default()),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn insert(&self, row_id: RowId, vector: Arc<[f32]>) -> VectorDbResult<()> {
        check_dims(self.dimensions, vector.len())?;

        let mut inner = self.inner.write();
        let position = inner.ids.len();
        inner.ids.push(row_id);
        inner.vectors.push(vector);
        inner.removed.push(false);
        let previous = inner.positions.insert(row_id, position);
        assert!(previous.is_none(), "row id {} inserted twice into flat index", row_id);
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        _ef: Option<usize>,
        accept: &dyn Fn(RowId) -> bool,
    ) -> VectorDbResult<Vec<Neighbor>> {
        check_dims(self.dimensions, query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let mut top: BinaryHeap<Farthest> = BinaryHeap::with_capacity(k.min(inner.ids.len()).saturating_add(1));

        for (position, vector) in inner.vectors.iter().enumerate() {
            if inner.removed[position] {
                continue;
            }
            let row_id = inner.ids[position];
            if !accept(row_id) {
                continue;
            }

            let candidate = Neighbor::new(row_id, self.metric.eval(query, vector));
            if top.len() < k {
                top.push(Farthest(candidate));
            } else if let Some(worst) = top.peek() {
                if candidate.rank_cmp(&worst.0).is_lt() {
                    top.pop();
                    top.push(Farthest(candidate));
                }
            }
        }

        let mut results: Vec<Neighbor> = top.into_iter().map(|f| f.0).collect();
        results.sort_by(Neighbor::rank_cmp);
        Ok(results)
    }

    fn remove(&self, row_id: RowId) -> bool {
        let mut inner = self.inner.write();
        let Some(&position) = inner.positions.get(&row_id) else {
            return false;
        };
        if inner.removed[position] {
            return false;
        }
        inner.removed[position] = true;
        inner.tombstones += 1;
        true
    }

    fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.ids.len() - inner.tombstones
    }

    fn tombstones(&self) -> usize {
        self.inner.read().tombstones
    }

    fn clear(&self) {
        *self.inner.write() = FlatInner::default();
    }
}
