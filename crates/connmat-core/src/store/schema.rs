//! SQLite Schema Definitions for Edge Stores
//!
//! An edge store is a single SQLite database holding one row per directed
//! edge plus a target-to-source index. All ids are 0-based node ids.
//!
//! ```text
//! edges              row_id → (source_node_id, target_node_id)
//! node_id_to_ranges  node_id → [range_start, range_end)  into range_to_edge_id
//! range_to_edge_id   range_id → [row_lo, row_hi)         into edges
//! store_metadata     key → value
//! ```

/// Schema version for edge store databases
pub const STORE_SCHEMA_VERSION: &str = "1.0";

/// Population name recorded when none is given
pub const DEFAULT_POPULATION: &str = "default";

/// Metadata keys
pub const META_SCHEMA_VERSION: &str = "schema_version";
pub const META_NODE_COUNT: &str = "node_count";
pub const META_EDGE_COUNT: &str = "edge_count";
pub const META_POPULATION: &str = "population";

/// SQL to create the edges table
///
/// `row_id` is contiguous from 0 and defines the fixed row order.
/// Parallel edges are distinct rows.
pub const SCHEMA_CREATE_EDGES: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    row_id INTEGER PRIMARY KEY NOT NULL,
    source_node_id INTEGER NOT NULL,
    target_node_id INTEGER NOT NULL
)
"#;

/// SQL to create the per-node slice into `range_to_edge_id`
pub const SCHEMA_CREATE_NODE_RANGES: &str = r#"
CREATE TABLE IF NOT EXISTS node_id_to_ranges (
    node_id INTEGER PRIMARY KEY NOT NULL,
    range_start INTEGER NOT NULL,
    range_end INTEGER NOT NULL
)
"#;

/// SQL to create the row spans referenced by `node_id_to_ranges`
pub const SCHEMA_CREATE_EDGE_RANGES: &str = r#"
CREATE TABLE IF NOT EXISTS range_to_edge_id (
    range_id INTEGER PRIMARY KEY NOT NULL,
    row_lo INTEGER NOT NULL,
    row_hi INTEGER NOT NULL
)
"#;

/// SQL to create the metadata table
pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS store_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Tables that must exist for a store to open
pub const REQUIRED_TABLES: [&str; 4] = [
    "edges",
    "node_id_to_ranges",
    "range_to_edge_id",
    "store_metadata",
];
