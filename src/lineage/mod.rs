//! Lineage forest construction and layout.
//!
//! Converts the flat version list into a forest keyed by parent pointers
//! and computes deterministic coordinates for inspection and selection:
//!
//! - `LineageTreeBuilder`: one-pass arena + id index, duplicate collapse,
//!   children ordered by creation
//! - `TreeLayout`: depth-first placement; row per depth, siblings spread
//!   symmetrically about their parent
//!
//! Layout output is a pure rendering contract: positioned nodes plus
//! `{source, target}` edges with no semantic weight beyond connectivity.

mod layout;
mod tree;

pub use layout::{Layout, LayoutConfig, LayoutEdge, LayoutNode, Position, TreeLayout};
pub use tree::{Forest, LineageTreeBuilder, TreeNode};
