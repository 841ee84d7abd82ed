//! Pipeline orchestration for transformation execution.
//!
//! This module drives a single version through its lifecycle:
//!
//! - `PipelineOrchestrator`: submits a transformation to the remote
//!   processor, transitions RAW → RUNNING, and runs a cancellable poll
//!   loop until a terminal status is observed
//! - `SessionContext`: explicit session identity passed into the
//!   orchestrator instead of ambient globals
//! - `PollEvent`: status updates pushed through a single-consumer channel
//!
//! One orchestrator instance polls at most one version at a time; starting
//! a new target stops the previous poll loop first.

mod context;
mod orchestrator;

pub use context::SessionContext;
pub use orchestrator::{PipelineOrchestrator, PollEvent};
