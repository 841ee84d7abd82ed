//! Command-line interface for prepline.
//!
//! Provides commands for listing versions, creating versions, running a
//! transformation pipeline and rendering the lineage tree.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
