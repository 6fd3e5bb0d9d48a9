//! Error types for smallworld operations.
//!
//! This module provides error handling for index building, searching,
//! metric registration, and prebuilt graph persistence.

use std::io;
use thiserror::Error;

/// Result type alias using [`SmallworldError`].
pub type Result<T> = std::result::Result<T, SmallworldError>;

/// Errors that can occur during smallworld operations.
#[derive(Error, Debug)]
pub enum SmallworldError {
    /// Vector dimensions do not match the expected dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected vector dimension.
        expected: usize,
        /// Actual vector dimension provided.
        actual: usize,
    },

    /// Operation requires a non-empty dataset but received empty input.
    ///
    /// Building an index over zero vectors is *not* an error; it yields a
    /// valid empty graph. This variant covers operations that genuinely
    /// need data, such as computing ground truth for an evaluation set.
    #[error("empty dataset: operation requires at least one vector")]
    EmptyDataset,

    /// No metric is registered under the given name.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// A different metric factory is already registered under this name.
    #[error("duplicate metric: '{0}' is already registered with a different factory")]
    DuplicateMetric(String),

    /// Self-query referenced a node outside the index.
    #[error("invalid node id: {id} (index holds {count} nodes)")]
    InvalidNodeId {
        /// The out-of-range node id.
        id: usize,
        /// Number of nodes in the index.
        count: usize,
    },

    /// Prebuilt blob was written by a newer format version.
    #[error("unsupported prebuilt version: {found} (max supported: {supported})")]
    UnsupportedVersion {
        /// Version tag found in the blob.
        found: u32,
        /// Highest version this build can decode.
        supported: u32,
    },

    /// Prebuilt blob failed structural validation.
    #[error("corrupt prebuilt graph: {0}")]
    CorruptPrebuilt(String),

    /// Invalid configuration parameter value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SmallworldError {
    /// Creates a new `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Creates a new `InvalidNodeId` error.
    pub fn invalid_node_id(id: usize, count: usize) -> Self {
        Self::InvalidNodeId { id, count }
    }

    /// Creates a new `CorruptPrebuilt` error.
    pub fn corrupt_prebuilt(msg: impl Into<String>) -> Self {
        Self::CorruptPrebuilt(msg.into())
    }

    /// Creates a new `InvalidConfig` error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<bincode::Error> for SmallworldError {
    fn from(err: bincode::Error) -> Self {
        Self::CorruptPrebuilt(err.to_string())
    }
}
