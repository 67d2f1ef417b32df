//! Read-only edge store handle.
//!
//! Wraps a single rusqlite connection opened read-only. The handle is the
//! scoped file resource: it is acquired by [`EdgeStore::open`] and released
//! when dropped, on every exit path. A `Connection` is `Send` but not `Sync`,
//! so one handle serves exactly one logical operation at a time; parallel
//! readers each call [`EdgeStore::open`] on the same path.

use crate::error::{ConnError, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Result as SqliteResult};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::schema::{
    DEFAULT_POPULATION, META_EDGE_COUNT, META_NODE_COUNT, META_POPULATION, META_SCHEMA_VERSION,
    REQUIRED_TABLES, STORE_SCHEMA_VERSION,
};

/// Half-open row span `[row_lo, row_hi)` into the edge table
pub type RowRange = (u64, u64);

/// A read-only handle over an edge store file
pub struct EdgeStore {
    conn: Connection,
    path: PathBuf,
    node_count: u64,
    edge_count: u64,
    population: String,
}

impl std::fmt::Debug for EdgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeStore")
            .field("path", &self.path)
            .field("population", &self.population)
            .field("node_count", &self.node_count)
            .field("edge_count", &self.edge_count)
            .finish()
    }
}

impl EdgeStore {
    /// Open an existing edge store.
    ///
    /// Fails with `FileFormat` if the file is missing, is not a SQLite
    /// database, lacks one of the required tables, or carries missing or
    /// unparseable metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConnError::file_format(path, "file does not exist"));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ConnError::file_format(path, e.to_string()))?;
        Self::configure_connection(&conn)
            .map_err(|e| ConnError::file_format(path, e.to_string()))?;

        Self::check_tables(&conn, path)?;

        let version = Self::read_metadata(&conn, path, META_SCHEMA_VERSION)?;
        if version != STORE_SCHEMA_VERSION {
            return Err(ConnError::file_format(
                path,
                format!(
                    "schema version mismatch: expected {}, found {}",
                    STORE_SCHEMA_VERSION, version
                ),
            ));
        }

        let node_count = Self::read_count(&conn, path, META_NODE_COUNT)?;
        let edge_count = Self::read_count(&conn, path, META_EDGE_COUNT)?;
        let population = conn
            .query_row(
                "SELECT value FROM store_metadata WHERE key = ?1",
                [META_POPULATION],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .unwrap_or_else(|| DEFAULT_POPULATION.to_string());

        debug!(
            "Opened edge store {:?}: {} nodes, {} edges, population '{}'",
            path, node_count, edge_count, population
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            node_count,
            edge_count,
            population,
        })
    }

    /// Configure connection for sequential read throughput
    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        conn.pragma_update(None, "query_only", true)?;
        // Negative value = KB
        conn.pragma_update(None, "cache_size", -64000)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "mmap_size", 268435456)?;
        Ok(())
    }

    fn check_tables(conn: &Connection, path: &Path) -> Result<()> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(|e| ConnError::file_format(path, e.to_string()))?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<SqliteResult<Vec<_>>>())
            .map_err(|e| ConnError::file_format(path, e.to_string()))?;

        for required in REQUIRED_TABLES {
            if !tables.iter().any(|t| t == required) {
                return Err(ConnError::file_format(
                    path,
                    format!("missing table '{}'", required),
                ));
            }
        }
        Ok(())
    }

    fn read_metadata(conn: &Connection, path: &Path, key: &str) -> Result<String> {
        conn.query_row(
            "SELECT value FROM store_metadata WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or_else(|| ConnError::file_format(path, format!("missing metadata '{}'", key)))
    }

    fn read_count(conn: &Connection, path: &Path, key: &str) -> Result<u64> {
        let raw = Self::read_metadata(conn, path, key)?;
        raw.trim().parse::<u64>().map_err(|_| {
            ConnError::file_format(path, format!("metadata '{}' is not a count: '{}'", key, raw))
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared number of nodes; valid node ids are `0..node_count`
    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Number of edge rows
    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    /// Edge population name recorded in the store
    pub fn population(&self) -> &str {
        &self.population
    }

    pub(crate) fn context(&self) -> String {
        format!("'{}'", self.path.display())
    }

    fn id_from_sql(&self, value: i64, column: &str) -> Result<u64> {
        u64::try_from(value).map_err(|_| {
            ConnError::file_format(&self.path, format!("negative {} {}", column, value))
        })
    }

    /// Read `(sources, targets)` for the half-open row interval `rows`.
    ///
    /// The interval is clipped to `[0, edge_count)`; an empty or inverted
    /// interval yields empty columns.
    pub fn read_rows(&self, rows: Range<u64>) -> Result<(Vec<u64>, Vec<u64>)> {
        let end = rows.end.min(self.edge_count);
        if rows.start >= end {
            return Ok((Vec::new(), Vec::new()));
        }

        let expected = (end - rows.start) as usize;
        let mut sources = Vec::with_capacity(expected);
        let mut targets = Vec::with_capacity(expected);

        let mut stmt = self.conn.prepare_cached(
            "SELECT source_node_id, target_node_id FROM edges \
             WHERE row_id >= ?1 AND row_id < ?2 ORDER BY row_id",
        )?;
        let mut cursor = stmt.query([rows.start as i64, end as i64])?;
        while let Some(row) = cursor.next()? {
            sources.push(self.id_from_sql(row.get(0)?, "source_node_id")?);
            targets.push(self.id_from_sql(row.get(1)?, "target_node_id")?);
        }

        if sources.len() != expected {
            return Err(ConnError::file_format(
                &self.path,
                format!(
                    "rows {}..{} hold {} edges, expected {}",
                    rows.start,
                    end,
                    sources.len(),
                    expected
                ),
            ));
        }

        Ok((sources, targets))
    }

    /// Row spans holding the incoming edges of `node_id`.
    ///
    /// An isolated node yields an empty list.
    pub fn incoming_ranges(&self, node_id: u64) -> Result<Vec<RowRange>> {
        if node_id >= self.node_count {
            return Err(ConnError::node_out_of_range(
                self.context(),
                node_id,
                self.node_count,
            ));
        }

        let slice: Option<(i64, i64)> = self
            .conn
            .prepare_cached(
                "SELECT range_start, range_end FROM node_id_to_ranges WHERE node_id = ?1",
            )?
            .query_row([node_id as i64], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((start, end)) = slice else {
            return Ok(Vec::new());
        };
        if start < 0 || end < start {
            return Err(ConnError::file_format(
                &self.path,
                format!("node {} has invalid range slice {}..{}", node_id, start, end),
            ));
        }
        if start == end {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT row_lo, row_hi FROM range_to_edge_id \
             WHERE range_id >= ?1 AND range_id < ?2 ORDER BY range_id",
        )?;
        let spans = stmt
            .query_map([start, end], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        if spans.len() as i64 != end - start {
            return Err(ConnError::file_format(
                &self.path,
                format!(
                    "node {} references ranges {}..{} but only {} exist",
                    node_id,
                    start,
                    end,
                    spans.len()
                ),
            ));
        }

        spans
            .into_iter()
            .map(|(lo, hi)| {
                if lo < 0 || hi < lo || hi as u64 > self.edge_count {
                    return Err(ConnError::file_format(
                        &self.path,
                        format!(
                            "node {} has row span {}..{} outside 0..{}",
                            node_id, lo, hi, self.edge_count
                        ),
                    ));
                }
                Ok((lo as u64, hi as u64))
            })
            .collect()
    }

    /// Source ids of the given row spans, concatenated in span order.
    pub fn read_sources(&self, ranges: &[RowRange]) -> Result<Vec<u64>> {
        let total: u64 = ranges.iter().map(|(lo, hi)| hi.saturating_sub(*lo)).sum();
        let mut sources = Vec::with_capacity(total as usize);

        let mut stmt = self.conn.prepare_cached(
            "SELECT source_node_id FROM edges \
             WHERE row_id >= ?1 AND row_id < ?2 ORDER BY row_id",
        )?;
        for &(lo, hi) in ranges {
            if lo >= hi {
                continue;
            }
            let mut cursor = stmt.query([lo as i64, hi as i64])?;
            while let Some(row) = cursor.next()? {
                sources.push(self.id_from_sql(row.get(0)?, "source_node_id")?);
            }
        }

        Ok(sources)
    }

    /// Source ids of every edge targeting `node_id`, duplicates preserved.
    pub fn afferent_sources(&self, node_id: u64) -> Result<Vec<u64>> {
        let ranges = self.incoming_ranges(node_id)?;
        self.read_sources(&ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::writer::StoreWriter;
    use rusqlite::params;
    use tempfile::TempDir;

    fn scenario_store(dir: &TempDir) -> EdgeStore {
        let path = dir.path().join("edges.db");
        StoreWriter::new()
            .create(&path, 3, &[(0, 1), (0, 1), (1, 2), (2, 0)])
            .unwrap();
        EdgeStore::open(&path).unwrap()
    }

    #[test]
    fn test_open_reports_counts() {
        let dir = TempDir::new().unwrap();
        let store = scenario_store(&dir);
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.edge_count(), 4);
        assert_eq!(store.population(), "default");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.db");
        let err = EdgeStore::open(&path).unwrap_err();
        assert!(matches!(err, ConnError::FileFormat { .. }));
        assert!(err.to_string().contains("nope.db"));
    }

    #[test]
    fn test_open_rejects_non_sqlite_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is not a database at all, just bytes").unwrap();
        let err = EdgeStore::open(&path).unwrap_err();
        assert!(matches!(err, ConnError::FileFormat { .. }));
    }

    #[test]
    fn test_open_rejects_missing_index_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(crate::store::schema::SCHEMA_CREATE_EDGES, [])
                .unwrap();
            conn.execute(crate::store::schema::SCHEMA_CREATE_METADATA, [])
                .unwrap();
        }
        let err = EdgeStore::open(&path).unwrap_err();
        assert!(err.to_string().contains("node_id_to_ranges"));
    }

    #[test]
    fn test_open_rejects_missing_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edges.db");
        StoreWriter::new().create(&path, 2, &[(0, 1)]).unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "DELETE FROM store_metadata WHERE key = ?1",
                params![META_EDGE_COUNT],
            )
            .unwrap();
        }
        let err = EdgeStore::open(&path).unwrap_err();
        assert!(err.to_string().contains("edge_count"));
    }

    #[test]
    fn test_read_rows_preserves_order_and_clips() {
        let dir = TempDir::new().unwrap();
        let store = scenario_store(&dir);

        let (sources, targets) = store.read_rows(0..4).unwrap();
        assert_eq!(sources, vec![0, 0, 1, 2]);
        assert_eq!(targets, vec![1, 1, 2, 0]);

        let (sources, targets) = store.read_rows(2..100).unwrap();
        assert_eq!(sources, vec![1, 2]);
        assert_eq!(targets, vec![2, 0]);

        let (sources, _) = store.read_rows(4..8).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_incoming_ranges_and_sources() {
        let dir = TempDir::new().unwrap();
        let store = scenario_store(&dir);

        assert_eq!(store.incoming_ranges(1).unwrap(), vec![(0, 2)]);
        assert_eq!(store.afferent_sources(1).unwrap(), vec![0, 0]);
        assert_eq!(store.afferent_sources(0).unwrap(), vec![2]);
        assert_eq!(store.afferent_sources(2).unwrap(), vec![1]);
    }

    #[test]
    fn test_incoming_ranges_out_of_range() {
        let dir = TempDir::new().unwrap();
        let store = scenario_store(&dir);

        let err = store.incoming_ranges(3).unwrap_err();
        match err {
            ConnError::IndexOutOfRange { id, context, .. } => {
                assert_eq!(id, 3);
                assert!(context.contains("edges.db"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_isolated_node_has_no_ranges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edges.db");
        StoreWriter::new().create(&path, 5, &[(0, 1)]).unwrap();
        let store = EdgeStore::open(&path).unwrap();

        assert!(store.incoming_ranges(4).unwrap().is_empty());
        assert!(store.afferent_sources(4).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_span_is_file_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edges.db");
        StoreWriter::new().create(&path, 2, &[(0, 1)]).unwrap();
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("UPDATE range_to_edge_id SET row_hi = 99", [])
                .unwrap();
        }
        let store = EdgeStore::open(&path).unwrap();
        let err = store.incoming_ranges(1).unwrap_err();
        assert!(matches!(err, ConnError::FileFormat { .. }));
    }
}
