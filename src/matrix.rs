//! Dataset abstraction feeding raw vectors to index implementations.
//!
//! Indexes never own or copy the dataset; they read individual rows through
//! the narrow [`VectorSource`] capability. [`DenseMatrix`] is the standard
//! row-major implementation, but any host-supplied storage can implement the
//! trait.

use crate::error::{Result, SmallworldError};

/// Read-only access to a fixed set of fixed-dimension vectors.
///
/// Row indices are dense, `0..len()`, and double as node ids in every index
/// built over the source. Implementations must return the same data for the
/// same row for the lifetime of any index built over them.
pub trait VectorSource: Send + Sync {
    /// Dimensionality shared by every vector in the source.
    fn dimension(&self) -> usize;

    /// Number of vectors in the source.
    fn len(&self) -> usize;

    /// Return true if the source contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The vector stored at `row`.
    ///
    /// # Panics
    /// Panics if `row >= len()`.
    fn vector(&self, row: usize) -> &[f32];
}

/// An owned, row-major dense matrix of `f32` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: Vec<f32>,
    dim: usize,
    rows: usize,
}

impl DenseMatrix {
    /// Build a matrix from individual rows, validating that every row has
    /// the declared dimensionality.
    pub fn from_rows(dim: usize, rows: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(dim * rows.len());
        for row in rows {
            if row.len() != dim {
                return Err(SmallworldError::dimension_mismatch(dim, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            dim,
            rows: rows.len(),
        })
    }

    /// Build a matrix from a flat row-major buffer.
    ///
    /// Fails with `DimensionMismatch` when the buffer length is not a
    /// multiple of `dim`.
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(SmallworldError::invalid_config(
                "matrix dimensionality must be at least 1",
            ));
        }
        if data.len() % dim != 0 {
            return Err(SmallworldError::dimension_mismatch(
                dim,
                data.len() % dim,
            ));
        }
        let rows = data.len() / dim;
        Ok(Self { data, dim, rows })
    }

    /// An empty matrix with the given dimensionality.
    pub fn empty(dim: usize) -> Self {
        Self {
            data: Vec::new(),
            dim,
            rows: 0,
        }
    }

    /// The underlying flat row-major buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Iterate over rows in storage order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim.max(1))
    }
}

impl VectorSource for DenseMatrix {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    fn vector(&self, row: usize) -> &[f32] {
        let start = row * self.dim;
        &self.data[start..start + self.dim]
    }
}

impl<S: VectorSource + ?Sized> VectorSource for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    #[inline]
    fn vector(&self, row: usize) -> &[f32] {
        (**self).vector(row)
    }
}
