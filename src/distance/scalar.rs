//! Scalar (non-SIMD) distance kernels.
//!
//! Baselines for the vectorized kernels in [`super::simd`], fallbacks on
//! platforms without a SIMD path, and tail handlers for chunked kernels.

/// Squared Euclidean distance: sum((a[i] - b[i])^2).
///
/// The preferred kernel for neighbor ranking: squared distance is a
/// monotonic surrogate for Euclidean distance, so skipping the square root
/// does not change which neighbors are nearest.
///
/// # Panics
/// Panics if the slices have different lengths.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter().zip(b).fold(0.0, |acc, (x, y)| {
        let d = x - y;
        acc + d * d
    })
}

/// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2)).
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// Manhattan (L1) distance: sum(|a[i] - b[i]|).
///
/// # Panics
/// Panics if the slices have different lengths.
#[inline]
pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter().zip(b).fold(0.0, |acc, (x, y)| acc + (x - y).abs())
}
