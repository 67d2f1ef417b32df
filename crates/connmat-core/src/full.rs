//! Full Adjacency Matrix via Streaming Scan
//!
//! Reads the edge table in fixed-size row windows
//! `[0, chunk), [chunk, 2·chunk), …` up to the edge count and folds each
//! window into a [`CoordinateAccumulator`]. Peak memory is one chunk plus
//! the distinct (source, target) pairs, independent of the edge count, and
//! the output is identical for every chunk size.

use crate::error::Result;
use crate::matrix::{AdjacencyMatrix, CoordinateAccumulator};
use crate::store::EdgeStore;
use connmat_config::DEFAULT_CHUNK_SIZE;
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Iterator over consecutive half-open row windows covering `0..total`
#[derive(Debug, Clone)]
pub struct ChunkRanges {
    next: u64,
    total: u64,
    step: u64,
}

impl Iterator for ChunkRanges {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.step).min(self.total);
        self.next = end;
        Some(start..end)
    }
}

/// Row windows of at most `chunk_size` rows covering `0..total`.
///
/// A chunk size of 0 is treated as 1.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> ChunkRanges {
    ChunkRanges {
        next: 0,
        total,
        step: chunk_size.max(1),
    }
}

/// Builds the full adjacency matrix of a store
#[derive(Debug)]
pub struct MatrixBuilder<'a> {
    store: &'a EdgeStore,
    shape: Option<(usize, usize)>,
    chunk_size: u64,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(store: &'a EdgeStore) -> Self {
        Self {
            store,
            shape: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Explicit output shape `(rows, cols)`
    pub fn with_shape(mut self, rows: usize, cols: usize) -> Self {
        self.shape = Some((rows, cols));
        self
    }

    /// Square `(n, n)` output; prefer this over shape inference so that
    /// high-numbered nodes without edges keep their rows and columns.
    pub fn with_node_count(self, node_count: u64) -> Self {
        let n = node_count as usize;
        self.with_shape(n, n)
    }

    /// Edge rows per chunk
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Scan the whole store and build the matrix.
    ///
    /// Without an explicit shape, each axis is one more than the largest
    /// observed id. With one, an id outside it is `ShapeMismatch`.
    pub fn build(&self) -> Result<AdjacencyMatrix> {
        let edge_count = self.store.edge_count();
        info!(
            "Full scan of {:?}: {} edges in chunks of {}",
            self.store.path(),
            edge_count,
            self.chunk_size
        );
        let start = Instant::now();

        let mut acc = CoordinateAccumulator::new();
        for rows in chunk_ranges(edge_count, self.chunk_size) {
            let (sources, targets) = self.store.read_rows(rows.clone())?;
            acc.extend_chunk(&sources, &targets);
            debug!(
                "Chunk {}..{}: {} distinct pairs so far",
                rows.start,
                rows.end,
                acc.distinct()
            );
        }

        let shape = match self.shape {
            Some(shape) => shape,
            None => {
                let inferred = acc.inferred_shape();
                warn!(
                    "No shape given for {:?}; inferred {}x{} from observed ids, \
                     trailing nodes without edges are dropped",
                    self.store.path(),
                    inferred.0,
                    inferred.1
                );
                inferred
            }
        };

        let edges_seen = acc.edges_seen();
        let matrix = acc.into_matrix(shape)?;
        info!(
            "Built {}x{} matrix from {} edges: {} entries in {:.2}s",
            shape.0,
            shape.1,
            edges_seen,
            matrix.nnz(),
            start.elapsed().as_secs_f64()
        );
        Ok(matrix)
    }
}
