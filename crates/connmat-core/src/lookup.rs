//! Group partitions and node lookups.
//!
//! A [`GroupPartition`] assigns gids to groups named by composite
//! [`GroupKey`]s. Flipping it yields a [`NodeLookup`], the node id → group
//! label map every aggregation folds over. A lookup is built once per call:
//!
//! - **filled**: dense over all node ids; undeclared nodes carry
//!   [`GroupLabel::Void`]. Required by full-scan aggregation.
//! - **partial**: sparse; only declared nodes are present.

use crate::error::{ConnError, Result};
use crate::ids::gid_to_node;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// One component of a composite group key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Int(i64),
    Text(String),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Composite group key, compared part by part
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Vec<KeyPart>);

impl GroupKey {
    pub fn new<P: Into<KeyPart>>(parts: impl IntoIterator<Item = P>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.0.as_slice() {
            return write!(f, "{}", single);
        }
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, ")")
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self(vec![s.into()])
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        Self(vec![s.into()])
    }
}

impl From<i64> for GroupKey {
    fn from(v: i64) -> Self {
        Self(vec![v.into()])
    }
}

impl From<Vec<KeyPart>> for GroupKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }
}

/// Gids grouped by key, iterated in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPartition {
    groups: BTreeMap<GroupKey, Vec<u64>>,
}

impl GroupPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append gids to a group, creating it if needed
    pub fn insert(&mut self, key: impl Into<GroupKey>, gids: impl IntoIterator<Item = u64>) {
        self.groups.entry(key.into()).or_default().extend(gids);
    }

    /// Group `(gid, key)` rows by key; gids keep their row order.
    pub fn from_assignments<K: Into<GroupKey>>(rows: impl IntoIterator<Item = (u64, K)>) -> Self {
        let mut partition = Self::new();
        for (gid, key) in rows {
            partition.groups.entry(key.into()).or_default().push(gid);
        }
        partition
    }

    pub fn get(&self, key: &GroupKey) -> Option<&[u64]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&GroupKey, &[u64])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `InvalidPartition` naming the first declared gid absent from `all_gids`
    pub fn ensure_within(&self, all_gids: &[u64]) -> Result<()> {
        let known: HashSet<u64> = all_gids.iter().copied().collect();
        for (key, gids) in self.iter() {
            if let Some(gid) = gids.iter().find(|&&gid| !known.contains(&gid)) {
                return Err(ConnError::InvalidPartition(format!(
                    "gid {} in group {} is not part of the circuit",
                    gid, key
                )));
            }
        }
        Ok(())
    }

    /// Turn into a node lookup; `fill` selects a dense lookup over
    /// `node_count` nodes instead of a sparse one.
    pub fn flip(&self, node_count: u64, fill: bool) -> Result<NodeLookup> {
        if fill {
            NodeLookup::filled(self, node_count)
        } else {
            NodeLookup::partial(self, node_count)
        }
    }
}

/// Group label of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupLabel {
    /// Index into the lookup's keys
    Group(usize),
    /// Sentinel for nodes in no declared group
    Void,
}

/// Keys, member node ids and node → group index, in partition order
type Collected = (Vec<GroupKey>, Vec<Vec<u64>>, HashMap<u64, usize>);

#[derive(Debug, Clone)]
enum Labels {
    Filled(Vec<GroupLabel>),
    Partial(HashMap<u64, usize>),
}

/// Node id → group label map
#[derive(Debug, Clone)]
pub struct NodeLookup {
    keys: Vec<GroupKey>,
    /// Node ids per group, first occurrence order, no repeats
    members: Vec<Vec<u64>>,
    labels: Labels,
    node_count: u64,
}

impl NodeLookup {
    /// Dense lookup over `0..node_count`; undeclared nodes are `Void`.
    pub fn filled(partition: &GroupPartition, node_count: u64) -> Result<Self> {
        let (keys, members, assigned) = Self::collect(partition, node_count)?;

        let mut labels = vec![GroupLabel::Void; node_count as usize];
        for (node, group) in assigned {
            labels[node as usize] = GroupLabel::Group(group);
        }

        Ok(Self {
            keys,
            members,
            labels: Labels::Filled(labels),
            node_count,
        })
    }

    /// Dense lookup where `all_gids` lists the nodes that exist.
    ///
    /// Declared gids must be among `all_gids`; nodes of `all_gids` in no
    /// group are `Void`.
    pub fn filled_for_gids(
        partition: &GroupPartition,
        all_gids: &[u64],
        node_count: u64,
    ) -> Result<Self> {
        for &gid in all_gids {
            gid_to_node(gid, node_count, "circuit gids")?;
        }
        let lookup = Self::filled(partition, node_count)?;
        partition.ensure_within(all_gids)?;
        Ok(lookup)
    }

    /// Sparse lookup holding declared nodes only.
    pub fn partial(partition: &GroupPartition, node_count: u64) -> Result<Self> {
        let (keys, members, assigned) = Self::collect(partition, node_count)?;
        Ok(Self {
            keys,
            members,
            labels: Labels::Partial(assigned),
            node_count,
        })
    }

    /// Validate gids and index groups.
    ///
    /// A gid repeated inside one group counts once; a gid in two groups is
    /// `InvalidPartition`.
    fn collect(partition: &GroupPartition, node_count: u64) -> Result<Collected> {
        let mut keys = Vec::with_capacity(partition.len());
        let mut members = Vec::with_capacity(partition.len());
        let mut assigned: HashMap<u64, usize> = HashMap::new();

        for (group, (key, gids)) in partition.iter().enumerate() {
            let context = format!("group {}", key);
            let mut nodes = Vec::with_capacity(gids.len());
            for &gid in gids {
                let node = gid_to_node(gid, node_count, &context)?;
                match assigned.get(&node) {
                    Some(&g) if g == group => continue,
                    Some(&g) => {
                        return Err(ConnError::InvalidPartition(format!(
                            "gid {} is in both group {} and group {}",
                            gid, keys[g], key
                        )));
                    }
                    None => {
                        assigned.insert(node, group);
                        nodes.push(node);
                    }
                }
            }
            keys.push(key.clone());
            members.push(nodes);
        }

        Ok((keys, members, assigned))
    }

    /// Whether every node id below `node_count` has a label
    pub fn is_filled(&self) -> bool {
        matches!(self.labels, Labels::Filled(_))
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Label of `node_id`: `None` when the lookup does not cover it
    pub fn get(&self, node_id: u64) -> Option<GroupLabel> {
        match &self.labels {
            Labels::Filled(labels) => labels.get(node_id as usize).copied(),
            Labels::Partial(map) => map.get(&node_id).map(|&g| GroupLabel::Group(g)),
        }
    }

    pub fn key(&self, group: usize) -> Option<&GroupKey> {
        self.keys.get(group)
    }

    pub fn keys(&self) -> &[GroupKey] {
        &self.keys
    }

    /// Node ids of one group
    pub fn members(&self, group: usize) -> &[u64] {
        self.members.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn group_count(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn abc() -> GroupPartition {
        let mut p = GroupPartition::new();
        p.insert("A", [1, 2]);
        p.insert("B", [3]);
        p
    }

    #[test]
    fn test_key_display_and_order() {
        let single = GroupKey::from("L23");
        let pair = GroupKey::new(vec![KeyPart::from("L23"), KeyPart::from(4)]);
        assert_eq!(single.to_string(), "L23");
        assert_eq!(pair.to_string(), "(L23, 4)");

        let a = GroupKey::new(["L1", "PC"]);
        let b = GroupKey::new(["L1", "SST"]);
        assert!(a < b);
        assert_eq!(a, GroupKey::new(["L1", "PC"]));
    }

    #[test]
    fn test_from_assignments_groups_rows() {
        let p = GroupPartition::from_assignments(vec![(5, "B"), (1, "A"), (2, "B"), (4, "A")]);
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(&"A".into()), Some(&[1u64, 4][..]));
        assert_eq!(p.get(&"B".into()), Some(&[5u64, 2][..]));
        let keys: Vec<String> = p.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_filled_lookup_marks_void() {
        let mut p = GroupPartition::new();
        p.insert("A", [1]);
        let lookup = NodeLookup::filled(&p, 3).unwrap();

        assert!(lookup.is_filled());
        assert_eq!(lookup.get(0), Some(GroupLabel::Group(0)));
        assert_eq!(lookup.get(1), Some(GroupLabel::Void));
        assert_eq!(lookup.get(2), Some(GroupLabel::Void));
        assert_eq!(lookup.get(3), None);
    }

    #[test]
    fn test_partial_lookup_is_sparse() {
        let lookup = abc().flip(10, false).unwrap();

        assert!(!lookup.is_filled());
        assert_eq!(lookup.group_count(), 2);
        assert_eq!(lookup.get(1), Some(GroupLabel::Group(0)));
        assert_eq!(lookup.get(2), Some(GroupLabel::Group(1)));
        assert_eq!(lookup.get(5), None);
        assert_eq!(lookup.members(0), &[0, 1]);
        assert_eq!(lookup.key(1), Some(&GroupKey::from("B")));
    }

    #[test]
    fn test_repeated_gid_in_one_group_counts_once() {
        let mut p = GroupPartition::new();
        p.insert("A", [2, 2, 1]);
        let lookup = NodeLookup::partial(&p, 3).unwrap();
        assert_eq!(lookup.members(0), &[1, 0]);
    }

    #[test]
    fn test_gid_in_two_groups_is_rejected() {
        let mut p = abc();
        p.insert("C", [2]);
        let err = NodeLookup::filled(&p, 3).unwrap_err();
        assert!(matches!(err, ConnError::InvalidPartition(_)));
        assert!(err.to_string().contains("gid 2"));
    }

    #[test]
    fn test_gid_bounds_are_checked() {
        let mut p = GroupPartition::new();
        p.insert("A", [0]);
        assert!(matches!(
            NodeLookup::partial(&p, 3).unwrap_err(),
            ConnError::IndexOutOfRange { id: 0, .. }
        ));

        let mut p = GroupPartition::new();
        p.insert("A", [4]);
        assert!(matches!(
            NodeLookup::filled(&p, 3).unwrap_err(),
            ConnError::IndexOutOfRange { id: 4, .. }
        ));
    }

    #[test]
    fn test_filled_for_gids_requires_declared_gids_to_exist() {
        let lookup = NodeLookup::filled_for_gids(&abc(), &[1, 2, 3, 4], 4).unwrap();
        assert_eq!(lookup.get(3), Some(GroupLabel::Void));

        let err = NodeLookup::filled_for_gids(&abc(), &[1, 2], 4).unwrap_err();
        assert!(matches!(err, ConnError::InvalidPartition(_)));

        let err = NodeLookup::filled_for_gids(&abc(), &[1, 2, 3, 9], 4).unwrap_err();
        assert!(matches!(err, ConnError::IndexOutOfRange { id: 9, .. }));
    }

    #[test]
    fn test_ensure_within_names_missing_gid() {
        assert!(abc().ensure_within(&[1, 2, 3]).is_ok());

        let err = abc().ensure_within(&[1, 3]).unwrap_err();
        assert!(err.to_string().contains("gid 2"), "{err}");
    }
}
