//! Version records as persisted by the backend.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MethodId, TaskId};

/// Identifier of a version, assigned by the backend on creation.
pub type VersionId = i64;

/// Lifecycle status of a version.
///
/// Transitions are monotonic: RAW → RUNNING → {PROCESSED | FAILED}.
/// PROCESSED and FAILED are terminal; resubmission creates a new version.
/// Unknown wire values fail deserialization and are treated as a fetch
/// failure by the poll loop, never as a new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    /// Created, transformation not yet submitted.
    Raw,
    /// Submitted to the remote processor, awaiting completion.
    Running,
    /// Transformation finished and produced an artifact.
    Processed,
    /// Transformation failed remotely.
    Failed,
}

impl VersionStatus {
    /// Returns true for PROCESSED and FAILED, the states the poll loop
    /// stops on.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VersionStatus::Processed | VersionStatus::Failed)
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStatus::Raw => write!(f, "RAW"),
            VersionStatus::Running => write!(f, "RUNNING"),
            VersionStatus::Processed => write!(f, "PROCESSED"),
            VersionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Column classification, inherited down the lineage unless a
/// transformation changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Quantitative,
    Qualitative,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Quantitative => write!(f, "QUANTITATIVE"),
            DataType::Qualitative => write!(f, "QUALITATIVE"),
        }
    }
}

/// One node in the dataset transformation lineage.
///
/// Root versions (no `prev_version`) represent original uploaded data and
/// always carry `data_types`; derived versions inherit the mapping from
/// their parent at creation time unless explicitly overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique identifier, assigned by the backend; immutable.
    pub id: VersionId,
    /// Owning task identifier.
    pub task_id: TaskId,
    /// Transformation method applied to produce this version; None for roots.
    #[serde(default)]
    pub method_id: Option<MethodId>,
    /// User-facing label.
    pub name: String,
    /// Parent version; None marks a root (original dataset).
    #[serde(default)]
    pub prev_version: Option<VersionId>,
    /// Current lifecycle status.
    pub status: VersionStatus,
    /// Opaque transformation parameters, passed through untouched.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Artifact produced once PROCESSED.
    #[serde(default)]
    pub processed_file: Option<i64>,
    /// Column name → classification; None only for a derived version whose
    /// parent lookup failed at creation (degraded, logged).
    #[serde(default)]
    pub data_types: Option<HashMap<String, DataType>>,
    /// Creation timestamp; monotonically non-decreasing, used as the
    /// tie-break ordering for tree layout.
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// Returns true when this version has no parent.
    pub fn is_root(&self) -> bool {
        self.prev_version.is_none()
    }
}

/// Body of a version creation request.
///
/// The backend assigns `id`, `created_at` and the initial RAW status and
/// returns the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersionRecord {
    pub task_id: TaskId,
    #[serde(default)]
    pub method_id: Option<MethodId>,
    pub name: String,
    #[serde(default)]
    pub prev_version: Option<VersionId>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub data_types: Option<HashMap<String, DataType>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: VersionId, status: VersionStatus) -> Version {
        Version {
            id,
            task_id: 1,
            method_id: Some(5),
            name: format!("v{}", id),
            prev_version: None,
            status,
            config: serde_json::Value::Null,
            processed_file: None,
            data_types: Some(HashMap::from([("age".to_string(), DataType::Quantitative)])),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!VersionStatus::Raw.is_terminal());
        assert!(!VersionStatus::Running.is_terminal());
        assert!(VersionStatus::Processed.is_terminal());
        assert!(VersionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&VersionStatus::Processed).expect("serialize");
        assert_eq!(json, "\"PROCESSED\"");

        let status: VersionStatus = serde_json::from_str("\"RAW\"").expect("deserialize");
        assert_eq!(status, VersionStatus::Raw);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = serde_json::from_str::<VersionStatus>("\"ARCHIVED\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_version_record_round_trip() {
        let v = version(10, VersionStatus::Raw);
        let json = serde_json::to_value(&v).expect("serialize");

        assert_eq!(json["prev_version"], serde_json::Value::Null);
        assert_eq!(json["status"], "RAW");
        assert_eq!(json["data_types"]["age"], "QUANTITATIVE");

        let back: Version = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, v);
    }

    #[test]
    fn test_root_detection() {
        let mut v = version(3, VersionStatus::Raw);
        assert!(v.is_root());

        v.prev_version = Some(1);
        assert!(!v.is_root());
    }
}
