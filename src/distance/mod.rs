//! Distance computation module providing both scalar and SIMD implementations.
//!
//! The kernel functions automatically select the fastest available
//! implementation based on CPU feature detection at runtime. On top of the
//! kernels sits a pluggable metric layer: [`Distance`] is the strategy
//! interface consumed by index construction and search, and [`MetricRegistry`]
//! maps metric names to factories so that host applications can supply custom
//! distance computations without modifying the core.

pub mod scalar;
pub mod simd;

use crate::error::{Result, SmallworldError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name under which the Euclidean (L2) metric is registered.
pub const EUCLIDEAN: &str = "euclidean";

/// Name under which the squared Euclidean metric is registered.
///
/// This is the default metric: it ranks neighbors identically to Euclidean
/// distance while skipping the square root on the hot path. Callers wanting
/// true Euclidean distances must take the square root themselves.
pub const SQUARED_EUCLIDEAN: &str = "squared_euclidean";

/// Name under which the Manhattan (L1) metric is registered.
pub const MANHATTAN: &str = "manhattan";

/// A distance computation strategy for a fixed dimensionality.
///
/// Implementations must be deterministic pure functions of their inputs;
/// index construction and search both assume that repeated evaluation of the
/// same pair yields the same value.
pub trait Distance: Send + Sync {
    /// The registered name of this metric.
    fn name(&self) -> &str;

    /// The dimensionality this metric was created for.
    fn dimension(&self) -> usize;

    /// Compute the distance between two vectors.
    ///
    /// # Panics
    /// Panics if the slices have different lengths.
    fn compute(&self, a: &[f32], b: &[f32]) -> f32;
}

impl std::fmt::Debug for dyn Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distance")
            .field("name", &self.name())
            .field("dimension", &self.dimension())
            .finish()
    }
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy)]
pub struct Euclidean {
    dim: usize,
}

impl Euclidean {
    /// Create a Euclidean metric for the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Distance for Euclidean {
    fn name(&self) -> &str {
        EUCLIDEAN
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    #[inline]
    fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        simd::euclidean(a, b)
    }
}

/// Squared Euclidean distance, a monotonic surrogate for [`Euclidean`].
#[derive(Debug, Clone, Copy)]
pub struct SquaredEuclidean {
    dim: usize,
}

impl SquaredEuclidean {
    /// Create a squared Euclidean metric for the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Distance for SquaredEuclidean {
    fn name(&self) -> &str {
        SQUARED_EUCLIDEAN
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    #[inline]
    fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        simd::squared_euclidean(a, b)
    }
}

/// Manhattan (L1) distance.
#[derive(Debug, Clone, Copy)]
pub struct Manhattan {
    dim: usize,
}

impl Manhattan {
    /// Create a Manhattan metric for the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Distance for Manhattan {
    fn name(&self) -> &str {
        MANHATTAN
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    #[inline]
    fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        simd::manhattan(a, b)
    }
}

/// Factory producing a metric object for a given dimensionality.
pub type MetricFactory = Arc<dyn Fn(usize) -> Arc<dyn Distance> + Send + Sync>;

/// Registry mapping metric names to factories.
///
/// The registry is an explicit context object rather than process-wide
/// implicit state: builders and searchers take a `&MetricRegistry`, which
/// keeps tests hermetic and lets applications scope custom metrics.
///
/// Registration is expected to happen once, up front; after initialization
/// the registry is safe for concurrent `resolve` calls from any number of
/// threads.
pub struct MetricRegistry {
    factories: RwLock<HashMap<String, MetricFactory>>,
}

impl MetricRegistry {
    /// Create an empty registry with no metrics registered.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry pre-populated with the built-in metrics:
    /// [`EUCLIDEAN`], [`SQUARED_EUCLIDEAN`], and [`MANHATTAN`].
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut factories = registry.factories.write();
            factories.insert(
                EUCLIDEAN.to_string(),
                Arc::new(|dim| Arc::new(Euclidean::new(dim)) as Arc<dyn Distance>) as MetricFactory,
            );
            factories.insert(
                SQUARED_EUCLIDEAN.to_string(),
                Arc::new(|dim| Arc::new(SquaredEuclidean::new(dim)) as Arc<dyn Distance>)
                    as MetricFactory,
            );
            factories.insert(
                MANHATTAN.to_string(),
                Arc::new(|dim| Arc::new(Manhattan::new(dim)) as Arc<dyn Distance>) as MetricFactory,
            );
        }
        registry
    }

    /// Register a metric factory under the given name.
    ///
    /// Re-registering the *same* factory (the same `Arc`, compared by
    /// identity) is a no-op. Registering a different factory under an
    /// existing name fails with [`SmallworldError::DuplicateMetric`]; a name
    /// never silently changes meaning.
    pub fn register(&self, name: &str, factory: MetricFactory) -> Result<()> {
        let mut factories = self.factories.write();
        if let Some(existing) = factories.get(name) {
            if Arc::ptr_eq(existing, &factory) {
                return Ok(());
            }
            return Err(SmallworldError::DuplicateMetric(name.to_string()));
        }
        factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Resolve a metric name into a computation object for the given
    /// dimensionality.
    ///
    /// Fails with [`SmallworldError::UnknownMetric`] when no factory is
    /// registered under `name`.
    pub fn resolve(&self, name: &str, dimension: usize) -> Result<Arc<dyn Distance>> {
        let factories = self.factories.read();
        let factory = factories
            .get(name)
            .ok_or_else(|| SmallworldError::UnknownMetric(name.to_string()))?;
        Ok(factory(dimension))
    }

    /// Return true if a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
