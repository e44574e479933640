//! TreeFlattener: deterministic flattening for tree presentation
//!
//! Produces one flat, order-stable node sequence from the master records
//! and the per-key cached detail rows. Detail arrays are addressed by
//! explicit key lookup and iterated in master order — never in cache
//! iteration order — so the same inputs always produce the same output
//! sequence and the same paths.

use trellis_core::{MasterRecord, TreeNode, TreePath};

use crate::cache::DetailCache;

/// Flatten masters and their cached details into tree nodes.
///
/// For each master in input order: one node with path `[key]`, then one
/// node per cached detail row with path `[key, detail-{index}]`. Masters
/// with no cached details yet emit zero detail nodes; their children
/// appear in a later flatten call once the cache is populated.
pub fn flatten(masters: &[MasterRecord], cache: &DetailCache) -> Vec<TreeNode> {
    let mut nodes = Vec::with_capacity(masters.len());
    for master in masters {
        nodes.push(TreeNode {
            fields: master.fields.clone(),
            path: TreePath::master(master.key.clone()),
        });
        if let Some(rows) = cache.get(&master.key) {
            for (index, row) in rows.iter().enumerate() {
                nodes.push(TreeNode {
                    fields: row.fields.clone(),
                    path: TreePath::detail(master.key.clone(), index),
                });
            }
        }
    }
    nodes
}
