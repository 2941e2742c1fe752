//! HNSW (Hierarchical Navigable Small World) index
//!
//! ```text
//! Layer 2: o-----------------o          (few nodes, long-range links)
//!          |                 |
//! Layer 1: o-----o-----o-----o          (more nodes)
//!          |     |     |     |
//! Layer 0: o--o--o--o--o--o--o--o--o    (every node)
//! ```
//!
//! A node present on layer `k` is present on every layer below `k`.

mod index;
mod level;
mod node;
mod visited;

pub use index::{HnswIndex, HnswStats};
pub use level::LevelSampler;
pub use node::HnswNode;
