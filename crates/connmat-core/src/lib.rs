//! connmat Core - Connectivity matrices from edge-indexed graph stores
//!
//! This crate provides the extraction engine:
//! - Read-only edge stores with a target-to-source row index
//! - Full adjacency matrices via bounded-memory chunked scans
//! - Submatrices for arbitrary gid lists via indexed lookups only
//! - Group-to-group edge counts, by full scan or by indexed lookups
//! - Lazy per-group and per-group-pair matrices
//!
//! Gids are 1-based; node ids inside a store are 0-based (`node_id = gid - 1`).
//! Adjacency matrices collapse parallel edges, group counts include them.

pub mod aggregate;
pub mod circuit;
pub mod error;
pub mod fetch;
pub mod full;
pub mod groups;
pub mod ids;
pub mod logging;
pub mod lookup;
pub mod matrix;
pub mod store;

// Error re-exports
pub use error::{ConnError, IdKind, Result};

// Store re-exports
pub use store::{EdgeStore, RowRange, StoreStats, StoreWriter};

// Matrix re-exports
pub use fetch::IndexedFetcher;
pub use full::{chunk_ranges, MatrixBuilder};
pub use matrix::{AdjacencyMatrix, CoordinateAccumulator};

// Grouping re-exports
pub use aggregate::{GroupAggregator, GroupCountTable};
pub use groups::{GroupMatrixExtractor, GroupPairIter, GroupPairMatrices, GroupPairMatrix};
pub use lookup::{GroupKey, GroupLabel, GroupPartition, KeyPart, NodeLookup};

// Circuit re-exports
pub use circuit::{Analyzer, CircuitPaths, CircuitResolver};

pub use logging::init_logging;
