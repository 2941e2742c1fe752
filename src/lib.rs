//! Samyama Vector
//!
//! An in-process vector similarity search engine: schema-governed tables of
//! embedding vectors with scalar attributes, indexed by an exact flat scan
//! or an HNSW graph, queried for approximate nearest neighbors.
//!
//! # Architecture
//!
//! - `schema`: column definitions, validated once at table creation
//! - `vector`: distance metrics plus the flat and HNSW indices
//! - `table`: row storage, batch inserts, logical deletes
//! - `catalog`: live tables by name
//! - `query`: batched searches and the filter language
//! - `client`: explicit handles over a shared catalog
//!
//! ## Example Usage
//!
//! ```rust
//! use samyama_vector::{Client, DistanceMetric, IndexKind, NewRow, ScalarType, Schema};
//!
//! let client = Client::default();
//! let schema = Schema::builder()
//!     .scalar("sentences", ScalarType::String)
//!     .vector("vectors", 3, DistanceMetric::L2, IndexKind::Hnsw)
//!     .build()
//!     .unwrap();
//! client.create_table("docs", schema).unwrap();
//!
//! client
//!     .insert(
//!         "docs",
//!         vec![
//!             NewRow::new(vec![0.0, 0.0, 1.0]).with("sentences", "first"),
//!             NewRow::new(vec![1.0, 0.0, 0.0]).with("sentences", "second"),
//!         ],
//!     )
//!     .unwrap();
//!
//! let hits = client.search("docs", &[vec![0.9, 0.0, 0.1]], 1, None).unwrap();
//! assert_eq!(hits[0][0].get("sentences").and_then(|v| v.as_string()), Some("second"));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod table;
pub mod vector;

// Re-export main types for convenience
pub use catalog::{Acquired, Catalog};
pub use client::{AsyncClient, Client};
pub use config::{ConfigError, EngineConfig, HnswParams, TableOptions};
pub use error::{ErrorKind, VectorDbError, VectorDbResult};
pub use query::{BoundPredicate, CompareOp, Predicate, QueryEngine, SearchRequest};
pub use schema::{
    ColumnDef, ColumnDescriptor, ColumnKind, KindDescriptor, NewRow, RankedRow, Record, RowId, ScalarType,
    Schema, SchemaBuilder, SchemaDescriptor, Value, VectorSpec,
};
pub use table::{Table, TableStats};
pub use vector::{
    DistanceMetric, FlatIndex, HnswIndex, HnswStats, IndexKind, LevelSampler, Neighbor, VectorIndex,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
