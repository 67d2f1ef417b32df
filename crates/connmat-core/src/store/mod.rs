//! Edge Store Module
//!
//! SQLite-backed storage for directed edges and their target-to-source index:
//! - Read-only handles with chunked row reads and indexed range lookups
//! - Store creation from ordered edge lists
//!
//! # Architecture
//!
//! ```text
//! EdgeStore (read-only handle, one per logical operation)
//! ├── read_rows(range)          chunked sequential scan
//! ├── incoming_ranges(node)     node_id_to_ranges → range_to_edge_id
//! └── read_sources(ranges)      source column over row spans
//!
//! StoreWriter
//! └── create(path, node_count, edges)
//! ```

pub mod reader;
pub mod schema;
pub mod writer;

// Re-exports
pub use reader::{EdgeStore, RowRange};
pub use schema::{DEFAULT_POPULATION, REQUIRED_TABLES, STORE_SCHEMA_VERSION};
pub use writer::{StoreStats, StoreWriter};
