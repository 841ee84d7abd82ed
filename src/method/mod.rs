//! Method configuration interface.
//!
//! Transformation methods are external collaborators: their statistical
//! content lives behind the `MethodConfig` trait, which exposes only the
//! current column selection, per-column parameters and payload generation.
//! `generate_payload` returns `None` when the selection is invalid for the
//! method (e.g. fewer than the minimum required columns); the orchestrator
//! treats that as a local validation failure and never contacts the remote
//! processor.

use std::collections::HashMap;

use crate::model::MethodInvocation;

/// Source of a transformation invocation payload.
pub trait MethodConfig: Send + Sync {
    /// Columns currently selected for the transformation.
    fn selected_columns(&self) -> &[String];

    /// Method-specific parameter by key, if set.
    fn parameter(&self, key: &str) -> Option<&serde_json::Value>;

    /// Build the invocation payload, or `None` when the current selection
    /// is invalid for the method.
    fn generate_payload(&self) -> Option<MethodInvocation>;
}

/// Minimal concrete `MethodConfig` carrying an explicit column selection
/// and a flat parameter map. Used by the CLI; method semantics stay opaque.
#[derive(Debug, Clone)]
pub struct ColumnSelection {
    technique: String,
    method: String,
    min_columns: usize,
    columns: Vec<String>,
    parameters: HashMap<String, serde_json::Value>,
}

impl ColumnSelection {
    /// Creates a selection for the given technique/method pair requiring
    /// at least one column.
    pub fn new(technique: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            technique: technique.into(),
            method: method.into(),
            min_columns: 1,
            columns: Vec::new(),
            parameters: HashMap::new(),
        }
    }

    /// Sets the minimum number of columns the method requires.
    pub fn with_min_columns(mut self, min_columns: usize) -> Self {
        self.min_columns = min_columns;
        self
    }

    /// Sets the selected columns.
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Sets a method-specific parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

impl MethodConfig for ColumnSelection {
    fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    fn generate_payload(&self) -> Option<MethodInvocation> {
        if self.columns.len() < self.min_columns {
            return None;
        }

        let target = self
            .parameters
            .get("target")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Some(MethodInvocation {
            technique: self.technique.clone(),
            method: self.method.clone(),
            step: self.parameters.get("step").cloned(),
            value: self.parameters.get("value").cloned(),
            target,
            columns: self.columns.clone(),
        })
    }
}
