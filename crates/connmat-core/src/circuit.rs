//! Circuit resolution and the analysis facade.
//!
//! A [`CircuitResolver`] maps connectome names to edge store files and
//! knows the authoritative node count. [`Analyzer`] runs every top-level
//! operation against a resolver, opening one store handle per call and
//! releasing it when the call (or the returned lazy sequence) ends.

use crate::aggregate::{GroupAggregator, GroupCountTable};
use crate::error::{ConnError, Result};
use crate::fetch::IndexedFetcher;
use crate::full::MatrixBuilder;
use crate::groups::{GroupMatrixExtractor, GroupPairMatrices};
use crate::lookup::{GroupPartition, NodeLookup};
use crate::matrix::AdjacencyMatrix;
use crate::store::EdgeStore;
use connmat_config::{
    ConfigLoader, ConfigOverrides, ConnmatConfig, ExtractionConfig, ExtractionStrategy,
    LOCAL_CONNECTOME,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolves connectome names for one circuit
pub trait CircuitResolver {
    /// Edge store file of `connectome`
    fn resolve(&self, connectome: &str) -> Result<PathBuf>;

    /// Number of nodes in the circuit
    fn total_node_count(&self) -> Result<u64>;

    /// Every gid of the circuit, ascending
    fn all_gids(&self) -> Result<Vec<u64>> {
        Ok((1..=self.total_node_count()?).collect())
    }
}

/// Resolver backed by a circuit root directory and its configuration
#[derive(Debug, Clone)]
pub struct CircuitPaths {
    root: PathBuf,
    config: ConnmatConfig,
}

impl CircuitPaths {
    pub fn new(root: impl Into<PathBuf>, config: ConnmatConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Load the merged configuration for `root` (global, then local).
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        Self::load_with(root, &mut ConfigLoader::new(), None)
    }

    pub fn load_with(
        root: impl Into<PathBuf>,
        loader: &mut ConfigLoader,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<Self> {
        let root = root.into();
        let config = loader.load(&root, overrides)?;
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ConnmatConfig {
        &self.config
    }

    /// Connectome names this circuit knows, `local` first
    pub fn connectomes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.config.circuit.projections.keys().cloned().collect();
        names.sort();
        names.insert(0, LOCAL_CONNECTOME.to_string());
        names
    }
}

impl CircuitResolver for CircuitPaths {
    fn resolve(&self, connectome: &str) -> Result<PathBuf> {
        if connectome == LOCAL_CONNECTOME {
            return Ok(self.config.connectome_path(&self.root));
        }
        self.config
            .projection_path(&self.root, connectome)
            .ok_or_else(|| ConnError::UnknownConnectome {
                name: connectome.to_string(),
                available: self.connectomes().join(", "),
            })
    }

    /// The configured node count, or the local store's declared count.
    fn total_node_count(&self) -> Result<u64> {
        if let Some(count) = self.config.circuit.node_count {
            return Ok(count);
        }
        let store = EdgeStore::open(self.config.connectome_path(&self.root))?;
        Ok(store.node_count())
    }
}

/// Top-level connectivity operations over a circuit
#[derive(Debug, Clone)]
pub struct Analyzer<R> {
    resolver: R,
    extraction: ExtractionConfig,
}

impl Analyzer<CircuitPaths> {
    /// Analyzer for a circuit root, using its configured extraction settings
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let paths = CircuitPaths::load(root)?;
        let extraction = paths.config().extraction.clone();
        Ok(Self::new(paths, extraction))
    }
}

impl<R: CircuitResolver> Analyzer<R> {
    pub fn new(resolver: R, extraction: ExtractionConfig) -> Self {
        Self {
            resolver,
            extraction,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn extraction(&self) -> &ExtractionConfig {
        &self.extraction
    }

    /// Open `connectome` and check it against the circuit's node count.
    fn open(&self, connectome: &str) -> Result<(EdgeStore, u64)> {
        let path = self.resolver.resolve(connectome)?;
        let store = EdgeStore::open(&path)?;
        let node_count = self.resolver.total_node_count()?;
        if store.node_count() != node_count {
            return Err(ConnError::ShapeMismatch(format!(
                "circuit has {} nodes but connectome '{}' at {} declares {}",
                node_count,
                connectome,
                store.context(),
                store.node_count()
            )));
        }
        debug!("Connectome '{}' resolved to {:?}", connectome, path);
        Ok((store, node_count))
    }

    /// Adjacency of a connectome.
    ///
    /// Without gids, the full `(N, N)` matrix from a streaming scan.
    /// Otherwise an indexed submatrix from `for_gids` to `for_gids_post`
    /// (square when `for_gids_post` is absent).
    pub fn connection_matrix(
        &self,
        connectome: &str,
        for_gids: Option<&[u64]>,
        for_gids_post: Option<&[u64]>,
    ) -> Result<AdjacencyMatrix> {
        let (store, node_count) = self.open(connectome)?;
        match for_gids {
            None => {
                if for_gids_post.is_some() {
                    return Err(ConnError::ShapeMismatch(
                        "post gids given without pre gids".to_string(),
                    ));
                }
                MatrixBuilder::new(&store)
                    .with_node_count(node_count)
                    .chunk_size(self.extraction.chunk_size)
                    .build()
            }
            Some(pre) => IndexedFetcher::new(&store).build_submatrix(pre, for_gids_post),
        }
    }

    /// Group matrix extractor over `connectome` with the configured strategy
    pub fn extractor(&self, connectome: &str) -> Result<GroupMatrixExtractor> {
        let (store, _) = self.open(connectome)?;
        Ok(GroupMatrixExtractor::new(store)
            .strategy(self.extraction.strategy)
            .chunk_size(self.extraction.chunk_size))
    }

    /// Lazy per-group matrices (each group to itself)
    pub fn group_matrices<'p>(
        &self,
        connectome: &str,
        partition: &'p GroupPartition,
    ) -> Result<GroupPairMatrices<'p>> {
        Ok(self.extractor(connectome)?.into_within_groups(partition))
    }

    /// Lazy matrices for every (pre group, post group) pair
    pub fn cross_group_matrices<'p>(
        &self,
        connectome: &str,
        pre: &'p GroupPartition,
        post: &'p GroupPartition,
    ) -> Result<GroupPairMatrices<'p>> {
        Ok(self.extractor(connectome)?.into_between_groups(pre, post))
    }

    /// Edge counts between the groups of `partition`.
    ///
    /// Declared gids must be among `all_gids()` under either strategy. The
    /// full strategy fills the lookup and scans every edge; the indexed
    /// strategy reads only the declared nodes' afferents.
    pub fn matrix_between_groups(
        &self,
        connectome: &str,
        partition: &GroupPartition,
    ) -> Result<GroupCountTable> {
        let (store, node_count) = self.open(connectome)?;
        let all_gids = self.resolver.all_gids()?;
        let aggregator = GroupAggregator::new(&store).chunk_size(self.extraction.chunk_size);
        info!(
            "Group aggregation on '{}': {} groups, {} strategy",
            connectome,
            partition.len(),
            self.extraction.strategy
        );

        match self.extraction.strategy {
            ExtractionStrategy::Full => {
                let lookup = NodeLookup::filled_for_gids(partition, &all_gids, node_count)?;
                aggregator.partitioned(&lookup)
            }
            ExtractionStrategy::Indexed => {
                let lookup = NodeLookup::partial(partition, node_count)?;
                partition.ensure_within(&all_gids)?;
                if self.extraction.parallelism == 1 {
                    aggregator.partial(&lookup)
                } else {
                    aggregator.partial_parallel(&lookup, self.extraction.parallelism)
                }
            }
        }
    }
}
