//! Vector similarity: distance metrics and nearest-neighbor indices

pub mod flat;
pub mod hnsw;
pub mod index;
pub mod metric;

pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswStats, LevelSampler};
pub use index::{accept_all, build_index, IndexKind, Neighbor, VectorIndex};
pub use metric::{cosine_distance, dot, l2_squared, DistanceMetric, COSINE_ZERO_NORM_DISTANCE};
