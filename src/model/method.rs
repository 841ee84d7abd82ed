//! Method invocation payload and submission body.

use serde::{Deserialize, Serialize};

use super::MethodId;

/// Opaque structured parameters describing a requested transformation.
///
/// Produced by a method configuration builder and forwarded unmodified to
/// the remote processor; the core never interprets the contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInvocation {
    /// Transformation family (e.g. "imputation").
    pub technique: String,
    /// Concrete method within the family (e.g. "mean").
    pub method: String,
    /// Method-specific step parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<serde_json::Value>,
    /// Method-specific value parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Target column for methods that produce a new column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Columns the transformation applies to.
    pub columns: Vec<String>,
}

/// Submission body sent to the remote processor: the invocation merged
/// with the session identity (camelCase on the wire).
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub invocation: MethodInvocation,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "taskMethodId")]
    pub task_method_id: MethodId,
}
