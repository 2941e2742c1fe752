//! Graph node with per-layer neighbor lists

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::schema::RowId;

/// A node in the HNSW graph.
///
/// The vector is immutable once the node exists. Each layer's neighbor list
/// has its own lock so that linking a new node only blocks readers of the
/// lists it touches.
#[derive(Debug)]
pub struct HnswNode {
    row_id: RowId,
    vector: Arc<[f32]>,
    /// `links[l]` = neighbors at layer `l`; `links.len() == level + 1`
    links: Vec<RwLock<Vec<u32>>>,
    removed: AtomicBool,
}

impl HnswNode {
    /// Node present on layers `0..=level`, with the given initial neighbor lists
    pub fn new(row_id: RowId, vector: Arc<[f32]>, level: usize, mut initial: Vec<Vec<u32>>) -> Self {
        assert!(initial.len() <= level + 1, "neighbor lists beyond node level");
        initial.resize_with(level + 1, Vec::new);
        Self {
            row_id,
            vector,
            links: initial.into_iter().map(RwLock::new).collect(),
            removed: AtomicBool::new(false),
        }
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Highest layer this node is present on
    pub fn level(&self) -> usize {
        self.links.len() - 1
    }

    /// Snapshot of the neighbor list at `layer` (empty above the node's level)
    pub fn neighbors(&self, layer: usize) -> Vec<u32> {
        self.links
            .get(layer)
            .map(|links| links.read().clone())
            .unwrap_or_default()
    }

    /// Number of neighbors at `layer`
    pub fn degree(&self, layer: usize) -> usize {
        self.links.get(layer).map(|links| links.read().len()).unwrap_or(0)
    }

    /// Runs `f` with exclusive access to the neighbor list at `layer`
    pub(crate) fn with_links_mut<R>(&self, layer: usize, f: impl FnOnce(&mut Vec<u32>) -> R) -> R {
        assert!(layer <= self.level(), "layer {} above node level {}", layer, self.level());
        let mut links = self.links[layer].write();
        f(&mut links)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Tombstones the node; false if it was already removed
    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(level: usize, initial: Vec<Vec<u32>>) -> HnswNode {
        HnswNode::new(RowId::new(42), Arc::from(&[1.0f32, 2.0][..]), level, initial)
    }

    #[test]
    fn test_node_creation() {
        let node = node(3, vec![vec![1, 2]]);
        assert_eq!(node.row_id(), RowId::new(42));
        assert_eq!(node.level(), 3);
        assert_eq!(node.neighbors(0), vec![1, 2]);
        assert!(node.neighbors(2).is_empty());
        assert!(node.neighbors(7).is_empty());
        assert_eq!(node.vector(), &[1.0, 2.0]);
    }

    #[test]
    fn test_links_mut() {
        let node = node(1, vec![]);
        node.with_links_mut(1, |links| links.push(5));
        assert_eq!(node.neighbors(1), vec![5]);
        assert_eq!(node.degree(1), 1);
        assert_eq!(node.degree(0), 0);
    }

    #[test]
    #[should_panic]
    fn test_links_above_level_panics() {
        let node = node(0, vec![]);
        node.with_links_mut(1, |links| links.push(1));
    }

    #[test]
    fn test_mark_removed() {
        let node = node(0, vec![]);
        assert!(!node.is_removed());
        assert!(node.mark_removed());
        assert!(!node.mark_removed());
        assert!(node.is_removed());
    }
}
