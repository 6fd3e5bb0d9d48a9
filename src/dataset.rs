//! Synthetic dataset generation and recall evaluation.
//!
//! Used by tests and benchmarks to produce reproducible random workloads
//! and to score approximate indices against exact ground truth.

use crate::distance::MetricRegistry;
use crate::error::{Result, SmallworldError};
use crate::index::brute_force::BruteForceIndex;
use crate::matrix::{DenseMatrix, VectorSource};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

/// A generated dataset: base vectors plus held-out query vectors.
pub struct Dataset {
    pub vectors: DenseMatrix,
    pub queries: DenseMatrix,
}

impl Dataset {
    /// Generate a random dataset with values uniform in [-1, 1).
    ///
    /// The same `seed` always produces the same vectors and queries.
    pub fn generate(n_vectors: usize, n_queries: usize, dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let range = Uniform::new(-1.0f32, 1.0);

        let mut sample = |rows: usize| {
            let data: Vec<f32> = (0..rows * dim).map(|_| range.sample(&mut rng)).collect();
            DenseMatrix::from_flat(dim, data).expect("generated data is rectangular")
        };

        let vectors = sample(n_vectors);
        let queries = sample(n_queries);
        Self { vectors, queries }
    }

    /// Exact k-nearest neighbors of every query, by brute force scan.
    ///
    /// # Errors
    /// Fails with `EmptyDataset` when there are no base vectors; ground
    /// truth over nothing would silently score every index as perfect.
    pub fn ground_truth(
        &self,
        registry: &MetricRegistry,
        metric: &str,
        k: usize,
    ) -> Result<Vec<Vec<usize>>> {
        if self.vectors.is_empty() {
            return Err(SmallworldError::EmptyDataset);
        }
        let index = BruteForceIndex::new(registry, &self.vectors, metric)?;
        self.queries
            .rows()
            .map(|query| {
                let neighbors = index.search_parallel(query, k)?;
                Ok(neighbors.into_iter().map(|n| n.index).collect())
            })
            .collect()
    }
}

/// Fraction of the true top-k that `predicted` recovered, in [0, 1].
pub fn recall_at_k(predicted: &[usize], ground_truth: &[usize], k: usize) -> f32 {
    if k == 0 {
        return 1.0;
    }
    let pred: HashSet<usize> = predicted.iter().take(k).copied().collect();
    let truth: HashSet<usize> = ground_truth.iter().take(k).copied().collect();
    pred.intersection(&truth).count() as f32 / k as f32
}
