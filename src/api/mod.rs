//! Backend API client for version records and transformation submission.
//!
//! The `VersionsApi` trait is the seam between the lineage core and the
//! platform backend: the store fetches version snapshots through it, the
//! orchestrator submits transformations and polls single versions. Tests
//! substitute a scripted implementation.

mod client;

pub use client::{HttpVersionsApi, VersionsApi};
