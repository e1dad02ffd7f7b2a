//! Tree resolver: transitive closure over the component parent pointer.
//!
//! Resolution runs inside the caller's transaction, level by level, with a
//! visited set. The disassembly lock keeps the closure stable for the rest of
//! the transaction, and because it is always re-read from the store, changes
//! made earlier in the same operation are visible.

use std::collections::HashSet;

use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};

use tenon_core::{Error, Result};

/// A component plus all of its transitive descendants.
///
/// Descendants are grouped by depth below the root: `levels[0]` holds the
/// direct children, `levels[1]` the grandchildren, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    root: i64,
    levels: Vec<Vec<i64>>,
}

impl Subtree {
    pub fn new(root: i64, levels: Vec<Vec<i64>>) -> Self {
        let levels = levels.into_iter().filter(|l| !l.is_empty()).collect();
        Self { root, levels }
    }

    /// The node the subtree was resolved from.
    pub fn root(&self) -> i64 {
        self.root
    }

    /// Descendants only, without the root.
    pub fn descendants(&self) -> HashSet<i64> {
        self.levels.iter().flatten().copied().collect()
    }

    /// Root followed by every descendant, shallowest first.
    pub fn all_ids(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(self.len());
        ids.push(self.root);
        ids.extend(self.levels.iter().flatten().copied());
        ids
    }

    /// Direct children of the root.
    pub fn direct_children(&self) -> &[i64] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        1 + self.levels.iter().map(Vec::len).sum::<usize>()
    }

    /// A subtree always contains its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_leaf(&self) -> bool {
        self.levels.is_empty()
    }

    /// Batches for bottom-up deletion: deepest level first, root alone last.
    pub fn deletion_order(&self) -> Vec<Vec<i64>> {
        let mut order: Vec<Vec<i64>> = self.levels.iter().rev().cloned().collect();
        order.push(vec![self.root]);
        order
    }
}

/// Resolves descendant sets from the component table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeResolver;

impl TreeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Compute the subtree rooted at `node_id` within `asset_id`.
    ///
    /// Walks one level per query starting from the node's direct children.
    /// Only nodes owned by `asset_id` are followed, so orphans and other
    /// assets' nodes that still point into the tree are never pulled in.
    /// A node already visited is never expanded again, so corrupted parent
    /// links that form a cycle terminate instead of looping.
    pub async fn descendants_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        asset_id: i64,
        node_id: i64,
    ) -> Result<Subtree> {
        let mut visited: HashSet<i64> = HashSet::from([node_id]);
        let mut levels: Vec<Vec<i64>> = Vec::new();
        let mut frontier = vec![node_id];

        while !frontier.is_empty() {
            let children: Vec<i64> = sqlx::query_scalar(
                "SELECT id FROM component \
                 WHERE tenant_id = $1 AND asset_id = $2 AND parent_id = ANY($3) \
                 ORDER BY id",
            )
            .bind(tenant_id)
            .bind(asset_id)
            .bind(frontier.as_slice())
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

            let mut next = Vec::with_capacity(children.len());
            for child in children {
                if visited.insert(child) {
                    next.push(child);
                } else {
                    warn!(
                        subsystem = "db",
                        component = "tree",
                        component_id = child,
                        root_id = node_id,
                        "Component reached twice while resolving subtree, parent links form a cycle"
                    );
                }
            }

            if !next.is_empty() {
                levels.push(next.clone());
            }
            frontier = next;
        }

        let subtree = Subtree::new(node_id, levels);
        debug!(
            subsystem = "db",
            component = "tree",
            op = "resolve",
            asset_id,
            component_id = node_id,
            subtree_size = subtree.len(),
            depth = subtree.levels.len(),
            "Resolved component subtree"
        );
        Ok(subtree)
    }
}
