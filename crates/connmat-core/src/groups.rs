//! Per-group and per-group-pair adjacency matrices.
//!
//! [`GroupMatrixExtractor`] produces matrices lazily: a
//! [`GroupPairMatrices`] only lists the requested pairs, and each matrix is
//! built when its iterator item is pulled. The sequence can be iterated any
//! number of times.
//!
//! With [`ExtractionStrategy::Full`] the full matrix is scanned once, on
//! first use, and every pair is sliced from it. With
//! [`ExtractionStrategy::Indexed`] every pair is an independent indexed fetch
//! and the full matrix is never built.

use crate::error::Result;
use crate::fetch::IndexedFetcher;
use crate::full::MatrixBuilder;
use crate::ids::gids_to_nodes;
use crate::lookup::{GroupKey, GroupPartition};
use crate::matrix::AdjacencyMatrix;
use crate::store::EdgeStore;
use connmat_config::{ExtractionStrategy, DEFAULT_CHUNK_SIZE};
use once_cell::unsync::OnceCell;
use std::path::Path;
use tracing::debug;

/// Matrix for one ordered (pre, post) group pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPairMatrix {
    pub pre: GroupKey,
    pub post: GroupKey,
    pub matrix: AdjacencyMatrix,
}

/// Builds group matrices from one edge store
#[derive(Debug)]
pub struct GroupMatrixExtractor {
    store: EdgeStore,
    strategy: ExtractionStrategy,
    chunk_size: u64,
    full: OnceCell<AdjacencyMatrix>,
}

impl GroupMatrixExtractor {
    /// Take ownership of an open store. The handle is released when the
    /// extractor is dropped.
    pub fn new(store: EdgeStore) -> Self {
        Self {
            store,
            strategy: ExtractionStrategy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            full: OnceCell::new(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(EdgeStore::open(path)?))
    }

    pub fn strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Edge rows per chunk for the full scan
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn store(&self) -> &EdgeStore {
        &self.store
    }

    /// Adjacency from `pre_gids` to `post_gids` with the configured strategy.
    pub fn matrix_for(&self, pre_gids: &[u64], post_gids: &[u64]) -> Result<AdjacencyMatrix> {
        match self.strategy {
            ExtractionStrategy::Indexed => {
                IndexedFetcher::new(&self.store).build_submatrix(pre_gids, Some(post_gids))
            }
            ExtractionStrategy::Full => {
                let node_count = self.store.node_count();
                let context = self.store.context();
                let rows = to_positions(gids_to_nodes(pre_gids, node_count, &context)?);
                let cols = to_positions(gids_to_nodes(post_gids, node_count, &context)?);
                self.full_matrix()?.select(&rows, &cols)
            }
        }
    }

    /// The whole store's `(N, N)` matrix, scanned on first call only
    fn full_matrix(&self) -> Result<&AdjacencyMatrix> {
        self.full.get_or_try_init(|| {
            MatrixBuilder::new(&self.store)
                .with_node_count(self.store.node_count())
                .chunk_size(self.chunk_size)
                .build()
        })
    }

    /// One matrix per group, from the group to itself.
    pub fn within_groups<'a>(&'a self, partition: &'a GroupPartition) -> GroupPairMatrices<'a> {
        GroupPairMatrices::new(Extractor::Borrowed(self), diagonal_pairs(partition))
    }

    /// One matrix per ordered pair `(pre group, post group)`, pre-major.
    pub fn between_groups<'a>(
        &'a self,
        pre: &'a GroupPartition,
        post: &'a GroupPartition,
    ) -> GroupPairMatrices<'a> {
        GroupPairMatrices::new(Extractor::Borrowed(self), cross_pairs(pre, post))
    }

    /// [`within_groups`](Self::within_groups), keeping the extractor (and
    /// its store handle) alive for as long as the sequence.
    pub fn into_within_groups(self, partition: &GroupPartition) -> GroupPairMatrices<'_> {
        GroupPairMatrices::new(Extractor::Owned(self), diagonal_pairs(partition))
    }

    /// [`between_groups`](Self::between_groups), owning the extractor.
    pub fn into_between_groups<'a>(
        self,
        pre: &'a GroupPartition,
        post: &'a GroupPartition,
    ) -> GroupPairMatrices<'a> {
        GroupPairMatrices::new(Extractor::Owned(self), cross_pairs(pre, post))
    }
}

fn diagonal_pairs(partition: &GroupPartition) -> Vec<GroupPair<'_>> {
    partition
        .iter()
        .map(|(key, gids)| GroupPair {
            pre: key,
            pre_gids: gids,
            post: key,
            post_gids: gids,
        })
        .collect()
}

fn cross_pairs<'a>(pre: &'a GroupPartition, post: &'a GroupPartition) -> Vec<GroupPair<'a>> {
    pre.iter()
        .flat_map(|(pre_key, pre_gids)| {
            post.iter().map(move |(post_key, post_gids)| GroupPair {
                pre: pre_key,
                pre_gids,
                post: post_key,
                post_gids,
            })
        })
        .collect()
}

fn to_positions(nodes: Vec<u64>) -> Vec<usize> {
    nodes.into_iter().map(|n| n as usize).collect()
}

#[derive(Debug, Clone, Copy)]
struct GroupPair<'a> {
    pre: &'a GroupKey,
    pre_gids: &'a [u64],
    post: &'a GroupKey,
    post_gids: &'a [u64],
}

#[derive(Debug)]
enum Extractor<'a> {
    Borrowed(&'a GroupMatrixExtractor),
    Owned(GroupMatrixExtractor),
}

impl Extractor<'_> {
    fn get(&self) -> &GroupMatrixExtractor {
        match self {
            Self::Borrowed(extractor) => extractor,
            Self::Owned(extractor) => extractor,
        }
    }
}

/// Lazy, restartable sequence of group pair matrices
#[derive(Debug)]
pub struct GroupPairMatrices<'a> {
    extractor: Extractor<'a>,
    pairs: Vec<GroupPair<'a>>,
}

impl<'a> GroupPairMatrices<'a> {
    fn new(extractor: Extractor<'a>, pairs: Vec<GroupPair<'a>>) -> Self {
        Self { extractor, pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Keys of every pair, without building anything
    pub fn keys(&self) -> impl Iterator<Item = (&GroupKey, &GroupKey)> {
        self.pairs.iter().map(|p| (p.pre, p.post))
    }

    /// Build the matrix of one pair, if the sequence has it
    pub fn get(&self, pre: &GroupKey, post: &GroupKey) -> Option<Result<AdjacencyMatrix>> {
        self.pairs
            .iter()
            .find(|p| p.pre == pre && p.post == post)
            .map(|p| self.extractor.get().matrix_for(p.pre_gids, p.post_gids))
    }

    /// Start a fresh pass over the sequence
    pub fn iter(&self) -> GroupPairIter<'_> {
        GroupPairIter {
            extractor: self.extractor.get(),
            pairs: self.pairs.iter(),
        }
    }
}

impl<'s, 'a> IntoIterator for &'s GroupPairMatrices<'a> {
    type Item = Result<GroupPairMatrix>;
    type IntoIter = GroupPairIter<'s>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`GroupPairMatrices`]
pub struct GroupPairIter<'s> {
    extractor: &'s GroupMatrixExtractor,
    pairs: std::slice::Iter<'s, GroupPair<'s>>,
}

impl Iterator for GroupPairIter<'_> {
    type Item = Result<GroupPairMatrix>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.pairs.next()?;
        debug!(
            "Building matrix {} -> {} ({}x{})",
            pair.pre,
            pair.post,
            pair.pre_gids.len(),
            pair.post_gids.len()
        );
        Some(
            self.extractor
                .matrix_for(pair.pre_gids, pair.post_gids)
                .map(|matrix| GroupPairMatrix {
                    pre: pair.pre.clone(),
                    post: pair.post.clone(),
                    matrix,
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for GroupPairIter<'_> {}
