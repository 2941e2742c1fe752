//! Query engine
//!
//! Runs scans and batched nearest-neighbor searches against a table. Every
//! argument is validated before the first search starts: `k`, the
//! dimensionality of each query vector, and the filter binding.

pub mod predicate;

pub use predicate::{BoundPredicate, CompareOp, Predicate};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{check_dims, VectorDbError, VectorDbResult};
use crate::schema::{RankedRow, Record};
use crate::table::Table;

/// Search parameters beyond the query vectors themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub k: usize,
    pub filter: Option<Predicate>,
    /// Overrides the index's default search width; raised to `k` if smaller
    pub ef: Option<usize>,
}

impl SearchRequest {
    pub fn new(k: usize) -> Self {
        Self { k, filter: None, ef: None }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_ef(mut self, ef: usize) -> Self {
        self.ef = Some(ef);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    /// Dedicated pool for query fan-out; rayon's global pool when unset
    pool: Option<Arc<ThreadPool>>,
}

impl QueryEngine {
    pub fn new(search_threads: usize) -> Self {
        if search_threads == 0 {
            return Self::default();
        }
        match ThreadPoolBuilder::new()
            .num_threads(search_threads)
            .thread_name(|i| format!("vector-search-{}", i))
            .build()
        {
            Ok(pool) => Self {
                pool: Some(Arc::new(pool)),
            },
            Err(e) => {
                warn!("Falling back to the global rayon pool: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.search_threads)
    }

    pub fn scan(&self, table: &Table, filter: Option<&Predicate>) -> VectorDbResult<Vec<Record>> {
        table.scan(filter)
    }

    /// One ranked list per query vector, in input order
    pub fn search(
        &self,
        table: &Table,
        queries: &[Vec<f32>],
        k: usize,
        filter: Option<&Predicate>,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        self.run(table, queries, k, None, filter)
    }

    pub fn search_with(
        &self,
        table: &Table,
        queries: &[Vec<f32>],
        request: &SearchRequest,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        self.run(table, queries, request.k, request.ef, request.filter.as_ref())
    }

    fn run(
        &self,
        table: &Table,
        queries: &[Vec<f32>],
        k: usize,
        ef: Option<usize>,
        filter: Option<&Predicate>,
    ) -> VectorDbResult<Vec<Vec<RankedRow>>> {
        if k == 0 {
            return Err(VectorDbError::invalid("k must be positive"));
        }
        let view = table.read_view()?;
        let dims = view.schema().dims();
        for query in queries {
            check_dims(dims, query.len())?;
        }
        let filter = filter.map(|p| p.bind(view.schema())).transpose()?;

        debug!(
            "Searching {} with {} queries (k={}, ef={:?}, filtered={})",
            table.name(),
            queries.len(),
            k,
            ef,
            filter.is_some()
        );

        let search_one = |query: &Vec<f32>| view.search(query, k, ef, filter.as_ref());
        if queries.len() <= 1 {
            return queries.iter().map(&search_one).collect();
        }
        let fan_out = || queries.par_iter().map(&search_one).collect::<VectorDbResult<Vec<_>>>();
        match &self.pool {
            Some(pool) => pool.install(fan_out),
            None => fan_out(),
        }
    }
}
