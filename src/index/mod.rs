//! Vector index implementations.
//!
//! Two families live here: [`brute_force`] for exact search (and ground
//! truth), and [`hnsw`] for approximate graph-based search. Both implement
//! the [`VectorIndex`] trait.

pub mod brute_force;
pub mod hnsw;
pub mod traits;

pub use brute_force::BruteForceIndex;
pub use hnsw::{HnswBuilder, HnswConfig, HnswGraph, HnswIndex, HnswSearcher, NodeId};
pub use traits::{split_neighbors, Neighbor, VectorIndex};
