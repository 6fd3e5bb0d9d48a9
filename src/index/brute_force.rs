//! Brute force index for exact nearest neighbor search.
//!
//! This implementation serves as the ground truth baseline for approximate
//! search algorithms. It computes distances to all vectors and returns the
//! k closest, guaranteeing 100% recall at the cost of O(n) search time.

use crate::distance::{Distance, MetricRegistry};
use crate::error::{Result, SmallworldError};
use crate::index::traits::{Neighbor, VectorIndex};
use crate::matrix::VectorSource;
use rayon::prelude::*;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Exact nearest neighbor index over a borrowed or owned vector source.
pub struct BruteForceIndex<M> {
    data: M,
    metric: Arc<dyn Distance>,
}

impl<M: VectorSource> BruteForceIndex<M> {
    /// Create an index over `data` using the named metric.
    ///
    /// # Errors
    /// Fails with `UnknownMetric` if `metric` is not registered.
    pub fn new(registry: &MetricRegistry, data: M, metric: &str) -> Result<Self> {
        let metric = registry.resolve(metric, data.dimension())?;
        Ok(Self { data, metric })
    }

    /// The metric used for query scoring.
    pub fn metric(&self) -> &Arc<dyn Distance> {
        &self.metric
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.data.dimension() {
            return Err(SmallworldError::dimension_mismatch(
                self.data.dimension(),
                query.len(),
            ));
        }
        Ok(())
    }

    /// Top-k scan skipping `exclude` (used by self-queries).
    fn scan(&self, query: &[f32], k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        let k = k.min(self.data.len());
        if k == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for row in 0..self.data.len() {
            if exclude == Some(row) {
                continue;
            }
            let distance = self.metric.compute(query, self.data.vector(row));
            let candidate = Neighbor::new(row, distance);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        let mut results = heap.into_vec();
        results.sort();
        results
    }

    /// Parallel exact search, scanning the dataset with rayon.
    ///
    /// Returns the same results as [`VectorIndex::search`]; worthwhile for
    /// large datasets or batch ground-truth computation.
    pub fn search_parallel(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_query(query)?;
        let k = k.min(self.data.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = (0..self.data.len())
            .into_par_iter()
            .map(|row| Neighbor::new(row, self.metric.compute(query, self.data.vector(row))))
            .collect();
        scored.sort();
        scored.truncate(k);
        Ok(scored)
    }
}

impl<M: VectorSource> VectorIndex for BruteForceIndex<M> {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_query(query)?;
        Ok(self.scan(query, k, None))
    }

    fn search_by_id(&self, id: usize, k: usize) -> Result<Vec<Neighbor>> {
        if id >= self.data.len() {
            return Err(SmallworldError::invalid_node_id(id, self.data.len()));
        }
        let query: Vec<f32> = self.data.vector(id).to_vec();
        Ok(self.scan(&query, k, Some(id)))
    }

    fn search_all(&self, query: &[f32], radius: f32) -> Result<Vec<Neighbor>> {
        self.check_query(query)?;
        let mut results: Vec<Neighbor> = (0..self.data.len())
            .filter_map(|row| {
                let distance = self.metric.compute(query, self.data.vector(row));
                (distance <= radius).then(|| Neighbor::new(row, distance))
            })
            .collect();
        results.sort();
        Ok(results)
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn dimension(&self) -> usize {
        self.data.dimension()
    }
}
