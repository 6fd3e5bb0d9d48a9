//! Common traits for vector index implementations.
//!
//! These traits provide a unified interface for different index types,
//! enabling generic code that works with any index implementation.

use crate::error::Result;
use std::cmp::Ordering;

/// A search result: a dataset row index and its distance to the query.
///
/// Neighbors order by ascending distance, with ties broken by ascending
/// index so that results are fully deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index of the matched vector in the original dataset.
    pub index: usize,
    /// Distance from the query under the index's configured metric.
    pub distance: f32,
}

impl Neighbor {
    /// Create a new Neighbor.
    #[inline]
    pub fn new(index: usize, distance: f32) -> Self {
        Self { index, distance }
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// Split a neighbor list into parallel (indices, distances) sequences.
///
/// Convenience for callers that want the two-array output shape rather than
/// a struct-per-result.
pub fn split_neighbors(neighbors: Vec<Neighbor>) -> (Vec<usize>, Vec<f32>) {
    let mut indices = Vec::with_capacity(neighbors.len());
    let mut distances = Vec::with_capacity(neighbors.len());
    for n in neighbors {
        indices.push(n.index);
        distances.push(n.distance);
    }
    (indices, distances)
}

/// Common interface for vector indices that support search operations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a built index is immutable and
/// search operations are safe to call from any number of threads.
pub trait VectorIndex: Send + Sync {
    /// Search for the k nearest neighbors to the query vector.
    ///
    /// Results are sorted by ascending distance (ties by ascending index).
    /// `k` larger than the index is clamped; `k == 0` returns no results.
    ///
    /// # Errors
    /// Fails with `DimensionMismatch` if the query length differs from the
    /// index dimensionality.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Search for the k nearest neighbors of a vector already in the index,
    /// excluding the vector itself from the results.
    ///
    /// # Errors
    /// Fails with `InvalidNodeId` if `id` is not within `[0, len())`.
    fn search_by_id(&self, id: usize, k: usize) -> Result<Vec<Neighbor>>;

    /// Find all vectors within `radius` of the query.
    ///
    /// Results are sorted by ascending distance. Exactness depends on the
    /// implementation: graph-based indices may miss in-range vectors but
    /// never return one whose true distance exceeds `radius`.
    fn search_all(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>>;

    /// Return the number of vectors in the index.
    fn len(&self) -> usize;

    /// Return true if the index contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the dimensionality of vectors in this index.
    fn dimension(&self) -> usize;
}
