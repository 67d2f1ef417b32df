//! Error types shared by every connmat-core operation.

use connmat_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading stores or building matrices
#[derive(Debug, Error)]
pub enum ConnError {
    /// Missing or malformed table, metadata or index entry
    #[error("invalid edge store '{path}': {message}")]
    FileFormat { path: PathBuf, message: String },

    /// A gid or node id beyond the declared node count
    #[error("{kind} {id} out of range for {context} (valid: {valid})")]
    IndexOutOfRange {
        context: String,
        kind: IdKind,
        id: u64,
        valid: String,
    },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid group partition: {0}")]
    InvalidPartition(String),

    #[error("invalid node lookup: {0}")]
    InvalidLookup(String),

    #[error("unknown connectome '{name}' (available: {available})")]
    UnknownConnectome { name: String, available: String },

    #[error("refusing to overwrite existing store '{0}'")]
    StoreExists(PathBuf),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Which identifier space an out-of-range id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// External 1-based identifier
    Gid,
    /// Internal 0-based identifier
    NodeId,
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gid => write!(f, "gid"),
            Self::NodeId => write!(f, "node id"),
        }
    }
}

impl ConnError {
    pub fn file_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Node id outside `[0, node_count)`.
    pub fn node_out_of_range(
        context: impl std::fmt::Display,
        node_id: u64,
        node_count: u64,
    ) -> Self {
        Self::IndexOutOfRange {
            context: context.to_string(),
            kind: IdKind::NodeId,
            id: node_id,
            valid: format!("0..{}", node_count),
        }
    }

    /// Gid outside `[1, node_count]`.
    pub fn gid_out_of_range(context: impl std::fmt::Display, gid: u64, node_count: u64) -> Self {
        Self::IndexOutOfRange {
            context: context.to_string(),
            kind: IdKind::Gid,
            id: gid,
            valid: format!("1..={}", node_count),
        }
    }
}

/// Result alias used throughout connmat-core
pub type Result<T> = std::result::Result<T, ConnError>;
