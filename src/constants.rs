//! Named constants for configuration defaults.
//!
//! This module centralizes default parameter values used throughout the
//! codebase, making them easier to find, document, and tune.

/// Constants for the HNSW index.
pub mod hnsw {
    /// Default M parameter (max connections per node above layer 0).
    /// Layer 0 allows twice this many connections.
    pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

    /// Default candidate-list size during construction.
    /// Larger values build a better graph at the cost of indexing time.
    pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

    /// Default candidate-list size during search.
    /// Effective beam width is always at least k.
    pub const DEFAULT_EF_SEARCH: usize = 10;

    /// Default seed for the layer-assignment random stream.
    pub const DEFAULT_SEED: u64 = 0;
}
