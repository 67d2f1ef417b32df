//! Common test utilities for integration tests.
//!
//! Edge store fixtures in temporary directories, seeded random graphs and
//! partitions, and brute-force reference computations over raw edge lists.

#![allow(dead_code)]

use connmat_core::{EdgeStore, GroupKey, GroupPartition, StoreWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

/// Edges of the reference scenario: a doubled 0→1, then 1→2 and 2→0.
pub const SCENARIO_EDGES: [(u64, u64); 4] = [(0, 1), (0, 1), (1, 2), (2, 0)];

/// A store written to a temporary directory, with the edges it holds
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    pub node_count: u64,
    pub edges: Vec<(u64, u64)>,
}

impl Fixture {
    pub fn new(node_count: u64, edges: Vec<(u64, u64)>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("edges.db");
        StoreWriter::new()
            .create(&path, node_count, &edges)
            .expect("Failed to write fixture store");
        Self {
            dir,
            path,
            node_count,
            edges,
        }
    }

    pub fn scenario() -> Self {
        Self::new(3, SCENARIO_EDGES.to_vec())
    }

    /// Random multigraph with parallel edges and runs of a shared target.
    ///
    /// The last few node ids never receive or send edges.
    pub fn random(seed: u64, node_count: u64, edge_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let active = (node_count - node_count / 5).max(1);
        let mut edges: Vec<(u64, u64)> = Vec::with_capacity(edge_count);
        while edges.len() < edge_count {
            let edge = match edges.last() {
                // parallel edge
                Some(&last) if rng.random_bool(0.15) => last,
                // same target, new source: extends an index span
                Some(&(_, t)) if rng.random_bool(0.35) => (rng.random_range(0..active), t),
                _ => (rng.random_range(0..active), rng.random_range(0..active)),
            };
            edges.push(edge);
        }
        Self::new(node_count, edges)
    }

    pub fn open(&self) -> EdgeStore {
        EdgeStore::open(&self.path).expect("Failed to open fixture store")
    }
}

/// Random partition of a subset of gids `1..=node_count` into `groups` groups.
///
/// Each gid is declared with probability `coverage`.
pub fn random_partition(seed: u64, node_count: u64, groups: usize, coverage: f64) -> GroupPartition {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut partition = GroupPartition::new();
    for gid in 1..=node_count {
        if rng.random_bool(coverage) {
            let group = rng.random_range(0..groups) as i64;
            partition.insert(GroupKey::from(group), [gid]);
        }
    }
    partition
}

/// Random gid list of length `len`, unsorted and possibly repeating
pub fn random_gids(seed: u64, node_count: u64, len: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(1..=node_count)).collect()
}

/// Source ids of edges into `target`, sorted
pub fn raw_afferents(edges: &[(u64, u64)], target: u64) -> Vec<u64> {
    let mut sources: Vec<u64> = edges
        .iter()
        .filter(|&&(_, t)| t == target)
        .map(|&(s, _)| s)
        .collect();
    sources.sort_unstable();
    sources
}

/// Brute-force group counts straight from the edge list
pub fn raw_group_counts(
    edges: &[(u64, u64)],
    partition: &GroupPartition,
) -> HashMap<(GroupKey, GroupKey), u64> {
    let mut group_of: HashMap<u64, &GroupKey> = HashMap::new();
    for (key, gids) in partition.iter() {
        for &gid in gids {
            group_of.insert(gid - 1, key);
        }
    }

    let mut counts = HashMap::new();
    for (s, t) in edges {
        if let (Some(&gs), Some(&gt)) = (group_of.get(s), group_of.get(t)) {
            *counts.entry((gs.clone(), gt.clone())).or_insert(0) += 1;
        }
    }
    counts
}
