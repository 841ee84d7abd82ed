//! Core data model for the version lineage.
//!
//! This module defines the central wire types shared by the store, the
//! pipeline orchestrator and the lineage builder:
//!
//! - `Version`: one node in the dataset transformation lineage
//! - `VersionStatus`: RAW → RUNNING → {PROCESSED | FAILED} lifecycle
//! - `DataType`: per-column QUANTITATIVE/QUALITATIVE annotation
//! - `MethodInvocation` / `SubmitRequest`: opaque transformation payload
//!   and the merged submission body sent to the remote processor

mod method;
mod version;

pub use method::{MethodInvocation, SubmitRequest};
pub use version::{DataType, NewVersionRecord, Version, VersionId, VersionStatus};

/// Identifier of an owning task/session.
pub type TaskId = i64;

/// Identifier of a transformation method.
pub type MethodId = i64;
