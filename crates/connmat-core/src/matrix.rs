//! Boolean sparse adjacency matrices.
//!
//! [`AdjacencyMatrix`] is stored as CSR (row pointers + sorted column
//! indices). An entry is present iff at least one edge exists for that
//! (row, column) pair: duplicate coordinates collapse.
//!
//! [`CoordinateAccumulator`] collects coordinates chunk by chunk, sorting
//! and deduplicating each chunk before merging it into a running sorted set,
//! so the live footprint is the distinct pairs plus one chunk.

use crate::error::{ConnError, Result};
use std::collections::HashMap;

/// Boolean sparse matrix in compressed sparse row form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    nrows: usize,
    ncols: usize,
    /// indptr[r]..indptr[r + 1] indexes row r's columns
    indptr: Vec<usize>,
    /// Column indices, strictly increasing within each row
    indices: Vec<usize>,
}

impl AdjacencyMatrix {
    /// A matrix with no true entries
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            indptr: vec![0; nrows + 1],
            indices: Vec::new(),
        }
    }

    /// Build from arbitrary coordinates; duplicates collapse.
    ///
    /// Fails with `ShapeMismatch` if a coordinate lies outside `shape`.
    pub fn from_coordinates(
        shape: (usize, usize),
        mut coords: Vec<(usize, usize)>,
    ) -> Result<Self> {
        coords.sort_unstable();
        coords.dedup();
        Self::from_sorted_unique(shape, &coords)
    }

    fn from_sorted_unique(shape: (usize, usize), coords: &[(usize, usize)]) -> Result<Self> {
        let (nrows, ncols) = shape;
        if let Some(&(r, c)) = coords.iter().find(|&&(r, c)| r >= nrows || c >= ncols) {
            return Err(ConnError::ShapeMismatch(format!(
                "entry ({}, {}) does not fit a {}x{} matrix",
                r, c, nrows, ncols
            )));
        }

        let mut indptr = vec![0usize; nrows + 1];
        for &(r, _) in coords {
            indptr[r + 1] += 1;
        }
        for r in 0..nrows {
            indptr[r + 1] += indptr[r];
        }
        let indices = coords.iter().map(|&(_, c)| c).collect();

        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
        })
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of true entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Column indices of row `r` (empty if out of bounds)
    pub fn row(&self, r: usize) -> &[usize] {
        if r >= self.nrows {
            return &[];
        }
        &self.indices[self.indptr[r]..self.indptr[r + 1]]
    }

    pub fn contains(&self, r: usize, c: usize) -> bool {
        self.row(r).binary_search(&c).is_ok()
    }

    /// True entries in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.nrows).flat_map(move |r| self.row(r).iter().map(move |&c| (r, c)))
    }

    /// Submatrix at the given row and column positions.
    ///
    /// Output row `i` is source row `rows[i]`, output column `j` is source
    /// column `cols[j]`; positions may repeat and appear in any order.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> Result<Self> {
        if let Some(&r) = rows.iter().find(|&&r| r >= self.nrows) {
            return Err(ConnError::ShapeMismatch(format!(
                "row {} selected from a matrix with {} rows",
                r, self.nrows
            )));
        }
        if let Some(&c) = cols.iter().find(|&&c| c >= self.ncols) {
            return Err(ConnError::ShapeMismatch(format!(
                "column {} selected from a matrix with {} columns",
                c, self.ncols
            )));
        }

        let mut col_positions: HashMap<usize, Vec<usize>> = HashMap::new();
        for (j, &c) in cols.iter().enumerate() {
            col_positions.entry(c).or_default().push(j);
        }

        let mut coords = Vec::new();
        for (i, &r) in rows.iter().enumerate() {
            for c in self.row(r) {
                if let Some(positions) = col_positions.get(c) {
                    coords.extend(positions.iter().map(|&j| (i, j)));
                }
            }
        }

        Self::from_coordinates((rows.len(), cols.len()), coords)
    }

    /// Dense row-major copy; meant for small matrices and tests
    pub fn to_dense(&self) -> Vec<Vec<bool>> {
        let mut dense = vec![vec![false; self.ncols]; self.nrows];
        for (r, c) in self.iter() {
            dense[r][c] = true;
        }
        dense
    }
}

/// Chunked coordinate collector with per-chunk deduplication
#[derive(Debug, Default)]
pub struct CoordinateAccumulator {
    pairs: Vec<(u64, u64)>,
    max_row: Option<u64>,
    max_col: Option<u64>,
    edges_seen: u64,
}

impl CoordinateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk of `(sources[i], targets[i])` pairs
    pub fn extend_chunk(&mut self, sources: &[u64], targets: &[u64]) {
        let mut chunk: Vec<(u64, u64)> = sources
            .iter()
            .copied()
            .zip(targets.iter().copied())
            .collect();
        self.edges_seen += chunk.len() as u64;

        chunk.sort_unstable();
        chunk.dedup();

        if let Some(&(r, _)) = chunk.last() {
            self.max_row = self.max_row.max(Some(r));
        }
        if let Some(c) = chunk.iter().map(|&(_, c)| c).max() {
            self.max_col = self.max_col.max(Some(c));
        }

        let running = std::mem::take(&mut self.pairs);
        self.pairs = merge_unique(running, chunk);
    }

    /// Distinct pairs collected so far
    pub fn distinct(&self) -> usize {
        self.pairs.len()
    }

    /// Edge rows consumed so far, duplicates included
    pub fn edges_seen(&self) -> u64 {
        self.edges_seen
    }

    /// One more than the largest observed id on each axis
    pub fn inferred_shape(&self) -> (usize, usize) {
        (
            self.max_row.map_or(0, |r| r as usize + 1),
            self.max_col.map_or(0, |c| c as usize + 1),
        )
    }

    pub fn into_matrix(self, shape: (usize, usize)) -> Result<AdjacencyMatrix> {
        let coords: Vec<(usize, usize)> = self
            .pairs
            .into_iter()
            .map(|(r, c)| (r as usize, c as usize))
            .collect();
        AdjacencyMatrix::from_sorted_unique(shape, &coords)
    }
}

/// Merge two sorted, duplicate-free lists into one
fn merge_unique(a: Vec<(u64, u64)>, b: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }

    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                merged.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                merged.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_coordinates_collapses_duplicates() {
        let m =
            AdjacencyMatrix::from_coordinates((3, 3), vec![(0, 1), (2, 0), (0, 1), (1, 2)])
                .unwrap();
        assert_eq!(m.nnz(), 3);
        assert!(m.contains(0, 1));
        assert!(m.contains(1, 2));
        assert!(m.contains(2, 0));
        assert!(!m.contains(1, 0));
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(0, 1), (1, 2), (2, 0)]);
    }

    #[test]
    fn test_from_coordinates_rejects_out_of_shape() {
        let err = AdjacencyMatrix::from_coordinates((2, 2), vec![(0, 2)]).unwrap_err();
        assert!(matches!(err, ConnError::ShapeMismatch(_)));
    }

    #[test]
    fn test_empty_rows_are_addressable() {
        let m = AdjacencyMatrix::from_coordinates((4, 2), vec![(3, 1)]).unwrap();
        assert!(m.row(0).is_empty());
        assert!(m.row(2).is_empty());
        assert_eq!(m.row(3), &[1]);
        assert!(m.row(10).is_empty());
    }

    #[test]
    fn test_select_positions_with_repeats_and_order() {
        // 0→1, 1→2, 2→0
        let m = AdjacencyMatrix::from_coordinates((3, 3), vec![(0, 1), (1, 2), (2, 0)]).unwrap();

        let sub = m.select(&[2, 0, 0], &[1, 0]).unwrap();
        assert_eq!(sub.shape(), (3, 2));
        assert_eq!(
            sub.to_dense(),
            vec![vec![false, true], vec![true, false], vec![true, false]]
        );
    }

    #[test]
    fn test_select_out_of_bounds() {
        let m = AdjacencyMatrix::empty(2, 2);
        assert!(m.select(&[2], &[0]).is_err());
        assert!(m.select(&[0], &[5]).is_err());
    }

    #[test]
    fn test_accumulator_chunking_is_invisible() {
        let sources = [0, 0, 1, 2, 0, 2];
        let targets = [1, 1, 2, 0, 1, 0];

        let mut whole = CoordinateAccumulator::new();
        whole.extend_chunk(&sources, &targets);

        let mut pieces = CoordinateAccumulator::new();
        for (s, t) in sources.chunks(4).zip(targets.chunks(4)) {
            pieces.extend_chunk(s, t);
        }

        assert_eq!(whole.edges_seen(), 6);
        assert_eq!(pieces.edges_seen(), 6);
        assert_eq!(whole.distinct(), 3);
        assert_eq!(whole.inferred_shape(), (3, 3));
        assert_eq!(
            whole.into_matrix((3, 3)).unwrap(),
            pieces.into_matrix((3, 3)).unwrap()
        );
    }

    #[test]
    fn test_inferred_shape_of_nothing() {
        let acc = CoordinateAccumulator::new();
        assert_eq!(acc.inferred_shape(), (0, 0));
    }

    #[test]
    fn test_merge_unique() {
        let merged = merge_unique(vec![(0, 1), (1, 1), (3, 0)], vec![(0, 0), (1, 1), (4, 4)]);
        assert_eq!(merged, vec![(0, 0), (0, 1), (1, 1), (3, 0), (4, 4)]);
    }
}
