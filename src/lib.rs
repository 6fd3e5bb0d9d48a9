//! smallworld: approximate nearest-neighbor search over dense vectors.
//!
//! This crate builds hierarchical navigable small world (HNSW) graphs over
//! an application-owned dataset and answers k-nearest-neighbor, self, and
//! radius queries against them.
//!
//! # Features
//!
//! - **HNSW Graphs**: deterministic, seedable construction with tunable
//!   `max_connections`, `ef_construction`, and `ef_search`
//! - **Pluggable Metrics**: Euclidean, squared Euclidean, and Manhattan
//!   built in, with a registry for application-defined metrics
//! - **SIMD Distance Kernels**: AVX2/FMA and NEON with scalar fallback
//! - **Prebuilt Graphs**: checksummed binary encoding so a graph built once
//!   can be reloaded without reconstruction
//! - **Brute Force Index**: exact search for small datasets and ground truth
//!
//! # Example
//!
//! ```
//! use smallworld::{
//!     Dataset, HnswBuilder, HnswConfig, MetricRegistry, VectorIndex, VectorSource,
//! };
//!
//! let registry = MetricRegistry::with_builtins();
//! let dataset = Dataset::generate(1000, 1, 32, 42);
//!
//! let builder = HnswBuilder::new(HnswConfig::default()).unwrap();
//! let index = builder.build(&registry, dataset.vectors).unwrap();
//!
//! let neighbors = index.search(dataset.queries.vector(0), 10).unwrap();
//! assert_eq!(neighbors.len(), 10);
//! ```

pub mod constants;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod index;
pub mod matrix;
pub mod persistence;

// Re-export commonly used types at crate root
pub use dataset::{recall_at_k, Dataset};
pub use distance::{Distance, MetricFactory, MetricRegistry};
pub use error::{Result, SmallworldError};
pub use index::{
    split_neighbors, BruteForceIndex, HnswBuilder, HnswConfig, HnswGraph, HnswIndex,
    HnswSearcher, Neighbor, NodeId, VectorIndex,
};
pub use matrix::{DenseMatrix, VectorSource};
pub use persistence::{decode_graph, encode_graph, load_graph, save_graph};
