//! Deterministic coordinates for the lineage forest.

use serde::Serialize;

use crate::model::{Version, VersionId};

use super::tree::Forest;

/// Geometry knobs for the layout.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Vertical distance between depths.
    pub row_height: f64,
    /// Horizontal spread between siblings at depth 1; halves per depth so
    /// cousin subtrees do not collide.
    pub sibling_spacing: f64,
    /// Horizontal distance between consecutive root anchors.
    pub root_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: 120.0,
            sibling_spacing: 360.0,
            root_spacing: 480.0,
        }
    }
}

/// A 2D coordinate on the rendering plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A positioned version node.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutNode {
    pub id: VersionId,
    #[serde(rename = "versionData")]
    pub version: Version,
    pub position: Position,
}

/// A directed parent → child edge; connectivity only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutEdge {
    pub source: VersionId,
    pub target: VersionId,
}

/// Positioned nodes and edges, in depth-first order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Layout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl Layout {
    /// Position of a node by version id.
    pub fn position(&self, id: VersionId) -> Option<Position> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.position)
    }
}

/// Depth-first layout over a lineage forest.
///
/// Each depth occupies one row; children spread symmetrically about their
/// parent's horizontal position, with the spread halving per depth. Roots
/// anchor their trees at fixed intervals, so each tree is centered
/// independently. Identical input always yields identical output.
pub struct TreeLayout {
    config: LayoutConfig,
}

impl TreeLayout {
    /// Creates a layout engine with default geometry.
    pub fn new() -> Self {
        Self {
            config: LayoutConfig::default(),
        }
    }

    /// Creates a layout engine with explicit geometry.
    pub fn with_config(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Computes positions and edges for the whole forest.
    pub fn layout(&self, forest: &Forest) -> Layout {
        let mut result = Layout::default();

        for (i, &root) in forest.roots().iter().enumerate() {
            let anchor_x = i as f64 * self.config.root_spacing;
            self.place(forest, root, anchor_x, 0, &mut result);
        }

        result
    }

    fn place(&self, forest: &Forest, index: usize, x: f64, depth: u32, out: &mut Layout) {
        let node = forest.node(index);

        out.nodes.push(LayoutNode {
            id: node.version.id,
            version: node.version.clone(),
            position: Position {
                x,
                y: f64::from(depth) * self.config.row_height,
            },
        });

        let count = node.children.len();
        let spread = self.config.sibling_spacing / f64::powi(2.0, depth as i32);

        for (i, &child) in node.children.iter().enumerate() {
            let offset = (i as f64 - (count as f64 - 1.0) / 2.0) * spread;

            out.edges.push(LayoutEdge {
                source: node.version.id,
                target: forest.node(child).version.id,
            });
            self.place(forest, child, x + offset, depth + 1, out);
        }
    }
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self::new()
    }
}
