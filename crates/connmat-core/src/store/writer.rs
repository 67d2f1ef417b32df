//! Edge Store Writer
//!
//! Creates a fresh edge store from an ordered edge list and derives the
//! target-to-source index. Existing stores are never modified.
//!
//! # Index layout
//!
//! For every target node, each maximal run of consecutive rows that target
//! it becomes one `[row_lo, row_hi)` span. A node's spans are stored
//! contiguously in `range_to_edge_id`, in row order, and
//! `node_id_to_ranges` records the slice. Every node id below
//! `node_count` gets a slice entry, empty for isolated nodes.

use crate::error::{ConnError, Result};
use rusqlite::{params, Connection};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::reader::RowRange;
use super::schema::{
    DEFAULT_POPULATION, META_EDGE_COUNT, META_NODE_COUNT, META_POPULATION, META_SCHEMA_VERSION,
    SCHEMA_CREATE_EDGES, SCHEMA_CREATE_EDGE_RANGES, SCHEMA_CREATE_METADATA,
    SCHEMA_CREATE_NODE_RANGES, STORE_SCHEMA_VERSION,
};

/// Statistics from writing a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub node_count: u64,
    pub edge_count: u64,
    /// Number of row spans in the target index
    pub range_count: u64,
}

/// Writes new edge stores
#[derive(Debug, Clone)]
pub struct StoreWriter {
    population: String,
}

impl Default for StoreWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreWriter {
    pub fn new() -> Self {
        Self {
            population: DEFAULT_POPULATION.to_string(),
        }
    }

    /// Record a population name in the store metadata
    pub fn population(mut self, name: impl Into<String>) -> Self {
        self.population = name.into();
        self
    }

    /// Create a store at `path` holding `edges` as `(source, target)` node ids
    /// in the given row order.
    ///
    /// Fails with `StoreExists` if `path` already exists and with
    /// `IndexOutOfRange` if an id is not below `node_count`. The file is
    /// built at `<path>.partial` and renamed into place, so a failed create
    /// leaves nothing at `path`.
    pub fn create(
        &self,
        path: impl AsRef<Path>,
        node_count: u64,
        edges: &[(u64, u64)],
    ) -> Result<StoreStats> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ConnError::StoreExists(path.to_path_buf()));
        }

        let context = format!("edge list for '{}'", path.display());
        for &(source, target) in edges {
            for id in [source, target] {
                if id >= node_count {
                    return Err(ConnError::node_out_of_range(&context, id, node_count));
                }
            }
        }

        let spans = target_spans(node_count, edges);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let staging = staging_path(path);
        if staging.is_file() {
            std::fs::remove_file(&staging)?;
        }
        let written = write_tables(&staging, node_count, edges, &spans, &self.population)
            .and_then(|range_count| {
                std::fs::rename(&staging, path)?;
                Ok(range_count)
            });
        let range_count = match written {
            Ok(range_count) => range_count,
            Err(e) => {
                if staging.is_file() {
                    if let Err(cleanup) = std::fs::remove_file(&staging) {
                        warn!("Could not remove partial store {:?}: {}", staging, cleanup);
                    }
                }
                return Err(e);
            }
        };

        let stats = StoreStats {
            node_count,
            edge_count: edges.len() as u64,
            range_count,
        };
        info!(
            "Wrote edge store {:?}: {} nodes, {} edges, {} index spans",
            path, stats.node_count, stats.edge_count, stats.range_count
        );
        Ok(stats)
    }
}

/// Sibling path the store is built at before being renamed into place
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write schema, rows, index and metadata in one transaction; returns the
/// number of index spans.
fn write_tables(
    path: &Path,
    node_count: u64,
    edges: &[(u64, u64)],
    spans: &[Vec<RowRange>],
    population: &str,
) -> Result<u64> {
    let mut conn = Connection::open(path)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute(SCHEMA_CREATE_EDGES, [])?;
    conn.execute(SCHEMA_CREATE_NODE_RANGES, [])?;
    conn.execute(SCHEMA_CREATE_EDGE_RANGES, [])?;
    conn.execute(SCHEMA_CREATE_METADATA, [])?;

    let tx = conn.transaction()?;
    let mut range_count = 0u64;
    {
        let mut insert_edge = tx.prepare(
            "INSERT INTO edges (row_id, source_node_id, target_node_id) VALUES (?1, ?2, ?3)",
        )?;
        for (row, &(source, target)) in edges.iter().enumerate() {
            insert_edge.execute(params![row as i64, source as i64, target as i64])?;
        }

        let mut insert_slice = tx.prepare(
            "INSERT INTO node_id_to_ranges (node_id, range_start, range_end) VALUES (?1, ?2, ?3)",
        )?;
        let mut insert_span = tx.prepare(
            "INSERT INTO range_to_edge_id (range_id, row_lo, row_hi) VALUES (?1, ?2, ?3)",
        )?;
        for (node_id, node_spans) in spans.iter().enumerate() {
            let start = range_count;
            for &(lo, hi) in node_spans {
                insert_span.execute(params![range_count as i64, lo as i64, hi as i64])?;
                range_count += 1;
            }
            insert_slice.execute(params![node_id as i64, start as i64, range_count as i64])?;
        }

        let mut insert_meta =
            tx.prepare("INSERT OR REPLACE INTO store_metadata (key, value) VALUES (?1, ?2)")?;
        insert_meta.execute(params![META_SCHEMA_VERSION, STORE_SCHEMA_VERSION])?;
        insert_meta.execute(params![META_NODE_COUNT, node_count.to_string()])?;
        insert_meta.execute(params![META_EDGE_COUNT, edges.len().to_string()])?;
        insert_meta.execute(params![META_POPULATION, population])?;
    }
    tx.commit()?;
    conn.close().map_err(|(_, e)| e)?;
    Ok(range_count)
}

/// Maximal runs of consecutive rows per target node, in row order.
fn target_spans(node_count: u64, edges: &[(u64, u64)]) -> Vec<Vec<RowRange>> {
    let mut spans = vec![Vec::new(); node_count as usize];
    let mut row = 0;
    while row < edges.len() {
        let target = edges[row].1;
        let start = row;
        while row < edges.len() && edges[row].1 == target {
            row += 1;
        }
        spans[target as usize].push((start as u64, row as u64));
    }
    spans
}
