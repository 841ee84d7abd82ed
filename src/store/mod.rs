//! Version store: authoritative snapshot of a task's versions.
//!
//! The store owns the ordered list of versions for one task and the active
//! selection. Snapshots are always replaced whole on fetch, never patched
//! incrementally; a failed fetch retains the last-known-good snapshot.

mod versions;

pub use versions::{NewVersion, VersionStore};
