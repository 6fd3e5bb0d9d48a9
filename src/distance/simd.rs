//! Vectorized distance kernels with runtime CPU dispatch.
//!
//! Tiers, fastest first:
//! - **AVX2+FMA** (x86_64): 8 lanes per iteration
//! - **NEON** (aarch64): 4 lanes per iteration, always present on aarch64
//! - **Scalar**: portable fallback
//!
//! The public `squared_euclidean` / `euclidean` / `manhattan` entry points
//! pick the best available tier, so callers never probe CPU features
//! themselves. Trailing elements past the last full SIMD chunk are handed to
//! the scalar kernels.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

use super::scalar;

// =============================================================================
// AVX2+FMA kernels (x86_64)
// =============================================================================

/// Collapse the 8 lanes of `v` into one f32.
#[cfg(target_arch = "x86_64")]
#[inline]
unsafe fn hsum256(v: __m256) -> f32 {
    let quad = _mm_add_ps(_mm256_castps256_ps128(v), _mm256_extractf128_ps(v, 1));
    let pair = _mm_add_ps(quad, _mm_movehl_ps(quad, quad));
    let single = _mm_add_ss(pair, _mm_shuffle_ps(pair, pair, 0b01));
    _mm_cvtss_f32(single)
}

/// Squared Euclidean distance over 8-lane chunks with FMA accumulation.
///
/// # Safety
/// The CPU must support AVX2 and FMA; dispatch through
/// [`squared_euclidean`] unless the caller has verified this.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[inline]
pub unsafe fn squared_euclidean_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let full = a.len() / 8 * 8;
    let mut acc = _mm256_setzero_ps();
    for offset in (0..full).step_by(8) {
        let lhs = _mm256_loadu_ps(a.as_ptr().add(offset));
        let rhs = _mm256_loadu_ps(b.as_ptr().add(offset));
        let delta = _mm256_sub_ps(lhs, rhs);
        acc = _mm256_fmadd_ps(delta, delta, acc);
    }

    hsum256(acc) + scalar::squared_euclidean(&a[full..], &b[full..])
}

/// Euclidean distance over 8-lane chunks.
///
/// # Safety
/// Same requirements as [`squared_euclidean_avx2`].
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[inline]
pub unsafe fn euclidean_avx2(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean_avx2(a, b).sqrt()
}

/// Manhattan distance over 8-lane chunks.
///
/// Lane-wise `|x - y|` is `max(x - y, y - x)`, which avoids loading a
/// sign-bit mask.
///
/// # Safety
/// The CPU must support AVX2; dispatch through [`manhattan`] unless the
/// caller has verified this.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
pub unsafe fn manhattan_avx2(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let full = a.len() / 8 * 8;
    let mut acc = _mm256_setzero_ps();
    for offset in (0..full).step_by(8) {
        let lhs = _mm256_loadu_ps(a.as_ptr().add(offset));
        let rhs = _mm256_loadu_ps(b.as_ptr().add(offset));
        let forward = _mm256_sub_ps(lhs, rhs);
        let backward = _mm256_sub_ps(rhs, lhs);
        acc = _mm256_add_ps(acc, _mm256_max_ps(forward, backward));
    }

    hsum256(acc) + scalar::manhattan(&a[full..], &b[full..])
}

// =============================================================================
// NEON kernels (aarch64)
// =============================================================================

/// Squared Euclidean distance over 4-lane chunks.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn squared_euclidean_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let full = a.len() / 4 * 4;
    // NEON is baseline on aarch64, so the intrinsics are always safe to issue
    let partial = unsafe {
        let mut acc = vdupq_n_f32(0.0);
        for offset in (0..full).step_by(4) {
            let lhs = vld1q_f32(a.as_ptr().add(offset));
            let rhs = vld1q_f32(b.as_ptr().add(offset));
            let delta = vsubq_f32(lhs, rhs);
            acc = vfmaq_f32(acc, delta, delta);
        }
        vaddvq_f32(acc)
    };

    partial + scalar::squared_euclidean(&a[full..], &b[full..])
}

/// Euclidean distance over 4-lane chunks.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn euclidean_neon(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean_neon(a, b).sqrt()
}

/// Manhattan distance over 4-lane chunks, using `vabdq` for lane-wise
/// absolute difference.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn manhattan_neon(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let full = a.len() / 4 * 4;
    let partial = unsafe {
        let mut acc = vdupq_n_f32(0.0);
        for offset in (0..full).step_by(4) {
            let lhs = vld1q_f32(a.as_ptr().add(offset));
            let rhs = vld1q_f32(b.as_ptr().add(offset));
            acc = vaddq_f32(acc, vabdq_f32(lhs, rhs));
        }
        vaddvq_f32(acc)
    };

    partial + scalar::manhattan(&a[full..], &b[full..])
}

// =============================================================================
// Dispatching entry points
// =============================================================================

/// Squared Euclidean distance, best available tier.
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            // SAFETY: feature presence verified above
            return unsafe { squared_euclidean_avx2(a, b) };
        }
        return scalar::squared_euclidean(a, b);
    }

    #[cfg(target_arch = "aarch64")]
    {
        return squared_euclidean_neon(a, b);
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    scalar::squared_euclidean(a, b)
}

/// Euclidean distance, best available tier.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            // SAFETY: feature presence verified above
            return unsafe { euclidean_avx2(a, b) };
        }
        return scalar::euclidean(a, b);
    }

    #[cfg(target_arch = "aarch64")]
    {
        return euclidean_neon(a, b);
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    scalar::euclidean(a, b)
}

/// Manhattan distance, best available tier.
#[inline]
pub fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            // SAFETY: feature presence verified above
            return unsafe { manhattan_avx2(a, b) };
        }
        return scalar::manhattan(a, b);
    }

    #[cfg(target_arch = "aarch64")]
    {
        return manhattan_neon(a, b);
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    scalar::manhattan(a, b)
}
