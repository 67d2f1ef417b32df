//! Group-to-group Edge Counts
//!
//! Two independent algorithms produce the same [`GroupCountTable`]:
//!
//! - **partitioned**: one streaming scan over every edge row, folding each
//!   chunk through a filled [`NodeLookup`]; cost follows the edge count.
//! - **partial**: per declared node, read only its afferent rows through the
//!   index; cost follows the afferent degree of the declared nodes.
//!
//! Both count every edge row, parallel edges included.
//!
//! ## Parallelism
//!
//! [`GroupAggregator::partial_parallel`] runs the partial algorithm with one
//! task per target group on a dedicated rayon pool. Each task opens its own
//! read-only [`EdgeStore`] handle; nothing mutable is shared between tasks.

use crate::error::{ConnError, Result};
use crate::full::chunk_ranges;
use crate::lookup::{GroupKey, GroupLabel, NodeLookup};
use crate::store::EdgeStore;
use connmat_config::DEFAULT_CHUNK_SIZE;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info};

/// Edge counts between ordered pairs of groups.
///
/// Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupCountTable {
    counts: BTreeMap<(GroupKey, GroupKey), u64>,
}

impl GroupCountTable {
    /// Number of edges from `source` to `target` (0 if none)
    pub fn get(&self, source: &GroupKey, target: &GroupKey) -> u64 {
        self.counts
            .get(&(source.clone(), target.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// `(source, target, count)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &GroupKey, u64)> {
        self.counts.iter().map(|((s, t), &c)| (s, t, c))
    }

    /// Number of group pairs with at least one edge
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all pairs
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn source_groups(&self) -> BTreeSet<&GroupKey> {
        self.counts.keys().map(|(s, _)| s).collect()
    }

    pub fn target_groups(&self) -> BTreeSet<&GroupKey> {
        self.counts.keys().map(|(_, t)| t).collect()
    }

    fn add(&mut self, source: &GroupKey, target: &GroupKey, count: u64) {
        if count > 0 {
            *self
                .counts
                .entry((source.clone(), target.clone()))
                .or_insert(0) += count;
        }
    }
}

/// Aggregates edges between the groups of a [`NodeLookup`]
#[derive(Debug)]
pub struct GroupAggregator<'a> {
    store: &'a EdgeStore,
    chunk_size: u64,
}

impl<'a> GroupAggregator<'a> {
    pub fn new(store: &'a EdgeStore) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Edge rows per chunk in partitioned mode
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Full-scan aggregation; requires a filled lookup.
    ///
    /// Rows and columns labeled `Void` are dropped from the result.
    pub fn partitioned(&self, lookup: &NodeLookup) -> Result<GroupCountTable> {
        if !lookup.is_filled() {
            return Err(ConnError::InvalidLookup(
                "partitioned aggregation needs a filled lookup covering every node".to_string(),
            ));
        }
        check_coverage(self.store, lookup)?;

        let edge_count = self.store.edge_count();
        info!(
            "Partitioned aggregation over {:?}: {} edges, {} groups",
            self.store.path(),
            edge_count,
            lookup.group_count()
        );
        let start = Instant::now();

        let mut running: HashMap<(GroupLabel, GroupLabel), u64> = HashMap::new();
        for rows in chunk_ranges(edge_count, self.chunk_size) {
            let (sources, targets) = self.store.read_rows(rows.clone())?;

            let mut tally: HashMap<(GroupLabel, GroupLabel), u64> = HashMap::new();
            for (&s, &t) in sources.iter().zip(targets.iter()) {
                let pair = (self.label_of(lookup, s)?, self.label_of(lookup, t)?);
                *tally.entry(pair).or_insert(0) += 1;
            }
            debug!(
                "Chunk {}..{}: {} group pairs",
                rows.start,
                rows.end,
                tally.len()
            );

            for (pair, count) in tally {
                *running.entry(pair).or_insert(0) += count;
            }
        }

        let mut table = GroupCountTable::default();
        for ((source, target), count) in running {
            if let (GroupLabel::Group(s), GroupLabel::Group(t)) = (source, target) {
                table.add(&lookup.keys()[s], &lookup.keys()[t], count);
            }
        }

        info!(
            "Partitioned aggregation done: {} group pairs, {} edges counted in {:.2}s",
            table.len(),
            table.total(),
            start.elapsed().as_secs_f64()
        );
        Ok(table)
    }

    fn label_of(&self, lookup: &NodeLookup, node_id: u64) -> Result<GroupLabel> {
        lookup.get(node_id).ok_or_else(|| {
            ConnError::node_out_of_range(self.store.context(), node_id, lookup.node_count())
        })
    }

    /// Indexed aggregation over declared groups only.
    ///
    /// Accepts a filled or a partial lookup; `Void` nodes are never visited.
    pub fn partial(&self, lookup: &NodeLookup) -> Result<GroupCountTable> {
        check_coverage(self.store, lookup)?;
        info!(
            "Partial aggregation over {:?}: {} groups",
            self.store.path(),
            lookup.group_count()
        );
        let start = Instant::now();

        let mut table = GroupCountTable::default();
        for group in 0..lookup.group_count() {
            let tally = tally_group(self.store, lookup, group)?;
            merge_group_tally(&mut table, lookup, group, tally);
        }

        info!(
            "Partial aggregation done: {} group pairs, {} edges counted in {:.2}s",
            table.len(),
            table.total(),
            start.elapsed().as_secs_f64()
        );
        Ok(table)
    }

    /// [`partial`](Self::partial) with one task per target group.
    ///
    /// `threads == 0` uses rayon's default pool size.
    pub fn partial_parallel(&self, lookup: &NodeLookup, threads: usize) -> Result<GroupCountTable> {
        check_coverage(self.store, lookup)?;
        let path = self.store.path().to_path_buf();
        info!(
            "Parallel partial aggregation over {:?}: {} groups",
            path,
            lookup.group_count()
        );
        let start = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;

        let tallies: Vec<(usize, HashMap<usize, u64>)> = pool.install(|| {
            (0..lookup.group_count())
                .into_par_iter()
                .map(|group| -> Result<(usize, HashMap<usize, u64>)> {
                    let store = EdgeStore::open(&path)?;
                    Ok((group, tally_group(&store, lookup, group)?))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut table = GroupCountTable::default();
        for (group, tally) in tallies {
            merge_group_tally(&mut table, lookup, group, tally);
        }

        info!(
            "Parallel partial aggregation done: {} group pairs in {:.2}s",
            table.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(table)
    }
}

/// The lookup must describe the same node id space as the store.
fn check_coverage(store: &EdgeStore, lookup: &NodeLookup) -> Result<()> {
    if lookup.node_count() != store.node_count() {
        return Err(ConnError::ShapeMismatch(format!(
            "lookup covers {} nodes but {} declares {}",
            lookup.node_count(),
            store.context(),
            store.node_count()
        )));
    }
    Ok(())
}

/// Source-group counts over the afferent edges of one group's members.
fn tally_group(
    store: &EdgeStore,
    lookup: &NodeLookup,
    group: usize,
) -> Result<HashMap<usize, u64>> {
    let mut tally: HashMap<usize, u64> = HashMap::new();
    let mut edges_read = 0usize;
    for &node in lookup.members(group) {
        let sources = store.afferent_sources(node)?;
        edges_read += sources.len();
        for source in sources {
            if let Some(GroupLabel::Group(s)) = lookup.get(source) {
                *tally.entry(s).or_insert(0) += 1;
            }
        }
    }
    debug!(
        "Group {}: {} members, {} afferent edges, {} source groups",
        group,
        lookup.members(group).len(),
        edges_read,
        tally.len()
    );
    Ok(tally)
}

fn merge_group_tally(
    table: &mut GroupCountTable,
    lookup: &NodeLookup,
    target: usize,
    tally: HashMap<usize, u64>,
) {
    let keys = lookup.keys();
    for (source, count) in tally {
        table.add(&keys[source], &keys[target], count);
    }
}
