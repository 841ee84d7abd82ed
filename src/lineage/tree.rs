//! Flat version list → forest.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::LineageError;
use crate::model::{Version, VersionId};

/// One node of the lineage forest.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// The version record carried by this node.
    pub version: Version,
    /// Children as arena indices, ordered by creation.
    pub children: Vec<usize>,
}

impl TreeNode {
    fn new(version: Version) -> Self {
        Self {
            version,
            children: Vec::new(),
        }
    }
}

/// Lineage forest: arena of nodes plus the root set.
///
/// Nodes reference each other by arena index, which sidesteps
/// pointer-graph ownership entirely; parents always precede children in
/// the arena because versions are created parent-first.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    index: HashMap<VersionId, usize>,
}

impl Forest {
    /// Number of nodes; duplicates in the input collapse, so this equals
    /// the number of distinct version ids.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Arena indices of the parentless versions, ordered by creation.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node at an arena index.
    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Looks a node up by version id.
    pub fn get(&self, id: VersionId) -> Option<&TreeNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// True when the forest holds no versions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds lineage forests from flat version lists.
pub struct LineageTreeBuilder;

impl LineageTreeBuilder {
    /// Groups versions by parent pointer into a forest.
    ///
    /// Duplicate records for the same id collapse to the first occurrence
    /// (malformed upstream data, logged). A version whose declared parent
    /// is absent from the input is a consistency error, not a root: a
    /// partial fetch must not silently reshape the lineage.
    pub fn build(versions: &[Version]) -> Result<Forest, LineageError> {
        let mut forest = Forest::default();

        for version in versions {
            if forest.index.contains_key(&version.id) {
                debug!(version_id = version.id, "Collapsing duplicate version record");
                continue;
            }
            forest.index.insert(version.id, forest.nodes.len());
            forest.nodes.push(TreeNode::new(version.clone()));
        }

        for i in 0..forest.nodes.len() {
            match forest.nodes[i].version.prev_version {
                None => forest.roots.push(i),
                Some(parent_id) => {
                    let parent = *forest.index.get(&parent_id).ok_or(
                        LineageError::Consistency {
                            id: forest.nodes[i].version.id,
                            parent: parent_id,
                        },
                    )?;
                    forest.nodes[parent].children.push(i);
                }
            }
        }

        // Creation ordering; ids break timestamp ties since the backend
        // assigns them in creation order.
        let keys: Vec<(DateTime<Utc>, VersionId)> = forest
            .nodes
            .iter()
            .map(|n| (n.version.created_at, n.version.id))
            .collect();
        forest.roots.sort_by_key(|&i| keys[i]);
        for node in &mut forest.nodes {
            node.children.sort_by_key(|&i| keys[i]);
        }

        Ok(forest)
    }
}
