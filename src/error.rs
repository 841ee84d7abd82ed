//! Error types for prepline operations.
//!
//! Defines error types for the major subsystems:
//! - Backend API transport (list/get/create/submit)
//! - Version store operations (validation, refresh, inheritance)
//! - Pipeline orchestration (submission, state guards, polling)
//! - Lineage tree construction
//! - Configuration loading and validation

use thiserror::Error;

use crate::model::{VersionId, VersionStatus};

/// Errors returned by the backend API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("API error ({code}): {message}")]
    Status { code: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors that can occur during version store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[source] ApiError),

    #[error("Create failed: {0}")]
    Create(#[source] ApiError),

    #[error("Data type inheritance failed for parent {parent}: {reason}")]
    Inheritance { parent: VersionId, reason: String },
}

/// Errors that can occur while driving a version through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Version {0} not found in the current snapshot")]
    NotFound(VersionId),

    #[error("No valid session context bound")]
    Auth,

    #[error("Version {id} is '{status}', only RAW versions can be started")]
    State { id: VersionId, status: VersionStatus },

    #[error("Invalid method selection: {0}")]
    Validation(String),

    #[error("Submission rejected: {0}")]
    Submission(#[source] ApiError),
}

/// Errors that can occur while building the lineage forest.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("Version {id} references missing parent {parent}")]
    Consistency { id: VersionId, parent: VersionId },
}

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}
