//! HNSW index
//!
//! **Insert**: sample a top layer `l`, greedily descend from the entry point
//! to layer `l + 1`, then on each layer `min(l, top)..=0` run a best-first
//! search of width `efConstruction`, pick neighbors with the diversity
//! heuristic and wire bidirectional edges.
//!
//! **Search**: greedy descent to layer 1, then best-first search on layer 0
//! with width `max(ef, k)`.
//!
//! # Concurrency
//!
//! Inserts are serialized by `writer`. The node list is behind a shared lock
//! that searches hold for their whole traversal; an insert takes it
//! exclusively only to push the new node, which at that point already owns
//! its vector and its own neighbor lists. Reverse edges are added afterwards
//! under per-list locks, so a node becomes reachable only once it is fully
//! formed.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use rand::RngCore;
use tracing::debug;

use super::level::LevelSampler;
use super::node::HnswNode;
use super::visited::Visited;
use crate::config::HnswParams;
use crate::error::{check_dims, VectorDbResult};
use crate::schema::RowId;
use crate::vector::index::{IndexKind, Neighbor, VectorIndex};
use crate::vector::metric::DistanceMetric;

/// Search candidate addressed by node slot
#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: u32,
    distance: f32,
}

impl Candidate {
    #[inline]
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Min-heap ordering: closest on top
#[derive(Clone, Copy)]
struct Closest(Candidate);

impl PartialEq for Closest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Closest {}

impl Ord for Closest {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.rank_cmp(&self.0)
    }
}

impl PartialOrd for Closest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap ordering: farthest on top
#[derive(Clone, Copy)]
struct Farthest(Candidate);

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryPoint {
    node: u32,
    level: usize,
}

/// Statistics about an HNSW graph
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HnswStats {
    /// Nodes in the graph, tombstoned ones included
    pub nodes: usize,
    pub max_layer: usize,
    /// `layer_counts[l]` = nodes present on layer `l`
    pub layer_counts: Vec<usize>,
    /// Directed edges over all layers
    pub total_edges: usize,
    pub entry_point: Option<RowId>,
}

/// Read-only traversal over a borrowed node list
struct Graph<'a> {
    nodes: &'a [HnswNode],
    metric: DistanceMetric,
}

impl<'a> Graph<'a> {
    #[inline]
    fn distance(&self, query: &[f32], node: u32) -> f32 {
        self.metric.eval(query, self.nodes[node as usize].vector())
    }

    #[inline]
    fn candidate(&self, query: &[f32], node: u32) -> Candidate {
        Candidate {
            node,
            distance: self.distance(query, node),
        }
    }

    /// Moves to the single nearest live neighbor until no neighbor improves
    fn greedy_closest(&self, query: &[f32], start: Candidate, layer: usize) -> Candidate {
        let mut best = start;
        loop {
            let mut improved = false;
            for neighbor in self.nodes[best.node as usize].neighbors(layer) {
                if self.nodes[neighbor as usize].is_removed() {
                    continue;
                }
                let candidate = self.candidate(query, neighbor);
                if candidate.rank_cmp(&best).is_lt() {
                    best = candidate;
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Best-first search on one layer.
    ///
    /// Every reachable node is traversable, but only nodes passing `accept`
    /// enter the result set, which is bounded by `ef`. Returns results sorted
    /// closest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[Candidate],
        ef: usize,
        layer: usize,
        accept: &dyn Fn(&HnswNode) -> bool,
    ) -> Vec<Candidate> {
        // The result set can never outgrow the graph
        let ef = ef.clamp(1, self.nodes.len().max(1));
        let mut visited = Visited::new(self.nodes.len());
        let mut frontier: BinaryHeap<Closest> = BinaryHeap::with_capacity(ef.saturating_mul(2));
        let mut results: BinaryHeap<Farthest> = BinaryHeap::with_capacity(ef.saturating_add(1));

        for &ep in entry_points {
            if !visited.insert(ep.node) {
                continue;
            }
            frontier.push(Closest(ep));
            if accept(&self.nodes[ep.node as usize]) {
                results.push(Farthest(ep));
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Closest(current)) = frontier.pop() {
            if results.len() >= ef {
                if let Some(Farthest(worst)) = results.peek() {
                    if current.rank_cmp(worst).is_gt() {
                        break;
                    }
                }
            }

            for neighbor in self.nodes[current.node as usize].neighbors(layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = self.candidate(query, neighbor);

                let promising = results.len() < ef
                    || results
                        .peek()
                        .map_or(true, |Farthest(worst)| candidate.rank_cmp(worst).is_lt());
                if !promising {
                    continue;
                }

                frontier.push(Closest(candidate));
                if accept(&self.nodes[neighbor as usize]) {
                    results.push(Farthest(candidate));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut found: Vec<Candidate> = results.into_iter().map(|f| f.0).collect();
        found.sort_by(Candidate::rank_cmp);
        found
    }

    /// Diversity-preserving neighbor selection.
    ///
    /// Walking candidates closest first, a candidate is kept only if it is
    /// closer to the base than to every neighbor already kept. Remaining
    /// slots are then filled with the closest skipped candidates.
    fn select_neighbors(&self, candidates: &[Candidate], m: usize) -> Vec<u32> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(Candidate::rank_cmp);

        let mut selected: Vec<Candidate> = Vec::with_capacity(m);
        let mut skipped: Vec<Candidate> = Vec::new();

        for candidate in sorted {
            if selected.len() >= m {
                break;
            }
            let candidate_vec = self.nodes[candidate.node as usize].vector();
            let diverse = selected.iter().all(|kept| {
                self.metric.eval(candidate_vec, self.nodes[kept.node as usize].vector()) >= candidate.distance
            });
            if diverse {
                selected.push(candidate);
            } else {
                skipped.push(candidate);
            }
        }

        for candidate in skipped {
            if selected.len() >= m {
                break;
            }
            selected.push(candidate);
        }

        selected.into_iter().map(|c| c.node).collect()
    }

    /// Adds the edge `from -> to` on `layer`, dropping `from`'s weakest edge
    /// if its degree would exceed `cap`
    fn link(&self, from: u32, to: u32, layer: usize, cap: usize) {
        let node = &self.nodes[from as usize];
        let metric = self.metric;
        let nodes = self.nodes;
        node.with_links_mut(layer, |links| {
            if links.contains(&to) {
                return;
            }
            links.push(to);
            if links.len() <= cap {
                return;
            }
            let base = node.vector();
            let weakest = links
                .iter()
                .enumerate()
                .map(|(pos, &n)| (pos, n, metric.eval(base, nodes[n as usize].vector())))
                .max_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.1.cmp(&b.1)))
                .map(|(pos, _, _)| pos);
            if let Some(pos) = weakest {
                links.swap_remove(pos);
            }
        });
    }
}

/// Hierarchical navigable small world index
pub struct HnswIndex {
    dimensions: usize,
    metric: DistanceMetric,
    params: HnswParams,
    nodes: RwLock<Vec<HnswNode>>,
    slots: RwLock<FxHashMap<RowId, u32>>,
    entry: RwLock<Option<EntryPoint>>,
    sampler: Mutex<LevelSampler>,
    writer: Mutex<()>,
    tombstones: AtomicUsize,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dimensions", &self.dimensions)
            .field("metric", &self.metric)
            .field("params", &self.params)
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

impl HnswIndex {
    /// Index whose level sampling draws from entropy
    pub fn new(dimensions: usize, metric: DistanceMetric, params: HnswParams) -> Self {
        let sampler = LevelSampler::from_entropy(params.level_multiplier(), params.max_level);
        Self::with_sampler(dimensions, metric, params, sampler)
    }

    /// Index with a reproducible level sequence
    pub fn with_seed(dimensions: usize, metric: DistanceMetric, params: HnswParams, seed: u64) -> Self {
        let sampler = LevelSampler::seeded(seed, params.level_multiplier(), params.max_level);
        Self::with_sampler(dimensions, metric, params, sampler)
    }

    /// Index drawing levels from a caller-supplied random source
    pub fn with_rng(
        dimensions: usize,
        metric: DistanceMetric,
        params: HnswParams,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        let sampler = LevelSampler::new(rng, params.level_multiplier(), params.max_level);
        Self::with_sampler(dimensions, metric, params, sampler)
    }

    fn with_sampler(dimensions: usize, metric: DistanceMetric, params: HnswParams, sampler: LevelSampler) -> Self {
        Self {
            dimensions,
            metric,
            params,
            nodes: RwLock::new(Vec::new()),
            slots: RwLock::new(FxHashMap::default()),
            entry: RwLock::new(None),
            sampler: Mutex::new(sampler),
            writer: Mutex::new(()),
            tombstones: AtomicUsize::new(0),
        }
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    fn layer_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m_max0
        } else {
            self.params.m
        }
    }

    /// Plans the new node's links on layers `min(level, top)..=0`.
    ///
    /// Returns `links[l]` for `l in 0..=level`; layers above the current top
    /// stay empty.
    fn plan_links(&self, graph: &Graph<'_>, query: &[f32], level: usize, entry: EntryPoint) -> Vec<Vec<u32>> {
        let mut links = vec![Vec::new(); level + 1];
        let mut current = graph.candidate(query, entry.node);

        for layer in (level + 1..=entry.level).rev() {
            current = graph.greedy_closest(query, current, layer);
        }

        let live = |node: &HnswNode| !node.is_removed();
        let mut entry_points = vec![current];
        for layer in (0..=level.min(entry.level)).rev() {
            let ef = self.params.ef_construction;
            let mut candidates = graph.search_layer(query, &entry_points, ef, layer, &live);
            if candidates.is_empty() {
                // Every reachable node is tombstoned; link through them to stay connected
                candidates = graph.search_layer(query, &entry_points, ef, layer, &|_| true);
            }
            links[layer] = graph.select_neighbors(&candidates, self.layer_cap(layer));
            if !candidates.is_empty() {
                entry_points = candidates;
            }
        }
        links
    }

    /// Panics if the graph breaks a structural invariant
    pub fn check_invariants(&self) {
        let nodes = self.nodes.read();
        for (slot, node) in nodes.iter().enumerate() {
            for layer in 0..=node.level() {
                let neighbors = node.neighbors(layer);
                assert!(
                    neighbors.len() <= self.layer_cap(layer),
                    "node {} exceeds degree cap on layer {}",
                    slot,
                    layer
                );
                for n in neighbors {
                    assert_ne!(n as usize, slot, "self loop at node {}", slot);
                    let target = &nodes[n as usize];
                    assert!(
                        target.level() >= layer,
                        "edge {} -> {} on layer {} targets a node absent from that layer",
                        slot,
                        n,
                        layer
                    );
                }
            }
        }
        if let Some(entry) = *self.entry.read() {
            let top = nodes.iter().map(HnswNode::level).max().unwrap_or(0);
            assert_eq!(entry.level, top, "entry point is not on the top layer");
            assert_eq!(nodes[entry.node as usize].level(), entry.level);
        }
    }
}

impl VectorIndex for HnswIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn insert(&self, row_id: RowId, vector: Arc<[f32]>) -> VectorDbResult<()> {
        check_dims(self.dimensions, vector.len())?;

        let _writer = self.writer.lock();
        assert!(
            !self.slots.read().contains_key(&row_id),
            "row id {} inserted twice into hnsw index",
            row_id
        );

        let level = self.sampler.lock().sample();
        let entry = *self.entry.read();

        let links = match entry {
            Some(entry) => {
                let nodes = self.nodes.read();
                let graph = Graph {
                    nodes: &nodes,
                    metric: self.metric,
                };
                self.plan_links(&graph, &vector, level, entry)
            }
            None => Vec::new(),
        };

        // Forward edges are in place before the node becomes visible
        let slot = {
            let mut nodes = self.nodes.write();
            let slot = u32::try_from(nodes.len()).expect("hnsw index exceeds u32 slots");
            nodes.push(HnswNode::new(row_id, vector, level, links.clone()));
            slot
        };

        {
            let nodes = self.nodes.read();
            let graph = Graph {
                nodes: &nodes,
                metric: self.metric,
            };
            for (layer, neighbors) in links.iter().enumerate() {
                for &neighbor in neighbors {
                    graph.link(neighbor, slot, layer, self.layer_cap(layer));
                }
            }
        }

        self.slots.write().insert(row_id, slot);

        if entry.map_or(true, |e| level > e.level) {
            *self.entry.write() = Some(EntryPoint { node: slot, level });
            debug!("hnsw entry point moved to row {} at layer {}", row_id, level);
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: Option<usize>,
        accept: &dyn Fn(RowId) -> bool,
    ) -> VectorDbResult<Vec<Neighbor>> {
        check_dims(self.dimensions, query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let nodes = self.nodes.read();
        let Some(entry) = *self.entry.read() else {
            return Ok(Vec::new());
        };
        let graph = Graph {
            nodes: &nodes,
            metric: self.metric,
        };

        let mut current = graph.candidate(query, entry.node);
        for layer in (1..=entry.level).rev() {
            current = graph.greedy_closest(query, current, layer);
        }

        let ef = ef.unwrap_or(self.params.ef_search).max(k).min(nodes.len());
        let emit = |node: &HnswNode| !node.is_removed() && accept(node.row_id());
        let found = graph.search_layer(query, &[current], ef, 0, &emit);

        let mut results: Vec<Neighbor> = found
            .into_iter()
            .map(|c| Neighbor::new(nodes[c.node as usize].row_id(), c.distance))
            .collect();
        results.sort_by(Neighbor::rank_cmp);
        results.truncate(k);
        Ok(results)
    }

    fn remove(&self, row_id: RowId) -> bool {
        let Some(slot) = self.slots.read().get(&row_id).copied() else {
            return false;
        };
        let removed = self.nodes.read()[slot as usize].mark_removed();
        if removed {
            self.tombstones.fetch_add(1, AtomicOrdering::AcqRel);
        }
        removed
    }

    fn len(&self) -> usize {
        self.nodes.read().len() - self.tombstones.load(AtomicOrdering::Acquire)
    }

    fn tombstones(&self) -> usize {
        self.tombstones.load(AtomicOrdering::Acquire)
    }

    fn clear(&self) {
        let _writer = self.writer.lock();
        let mut nodes = self.nodes.write();
        nodes.clear();
        nodes.shrink_to_fit();
        self.slots.write().clear();
        *self.entry.write() = None;
        self.tombstones.store(0, AtomicOrdering::Release);
    }

    fn hnsw_stats(&self) -> Option<HnswStats> {
        let nodes = self.nodes.read();
        let entry = *self.entry.read();
        let max_layer = entry.map(|e| e.level).unwrap_or(0);

        let mut layer_counts = vec![0usize; max_layer + 1];
        let mut total_edges = 0;
        for node in nodes.iter() {
            for layer in 0..=node.level() {
                layer_counts[layer] += 1;
                total_edges += node.degree(layer);
            }
        }

        Some(HnswStats {
            nodes: nodes.len(),
            max_layer,
            layer_counts,
            total_edges,
            entry_point: entry.map(|e| nodes[e.node as usize].row_id()),
        })
    }
}
