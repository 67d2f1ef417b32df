//! Conversions between external gids (1-based) and node ids (0-based).

use crate::error::{ConnError, Result};

/// Node id for `gid`, checked against `node_count`.
pub fn gid_to_node(gid: u64, node_count: u64, context: &str) -> Result<u64> {
    if gid == 0 || gid > node_count {
        return Err(ConnError::gid_out_of_range(context, gid, node_count));
    }
    Ok(gid - 1)
}

/// Gid for a node id. Unchecked: every node id has a gid.
pub fn node_to_gid(node_id: u64) -> u64 {
    node_id + 1
}

/// Convert a gid list, preserving order and duplicates.
///
/// The first offending gid is reported.
pub fn gids_to_nodes(gids: &[u64], node_count: u64, context: &str) -> Result<Vec<u64>> {
    gids.iter()
        .map(|&gid| gid_to_node(gid, node_count, context))
        .collect()
}
