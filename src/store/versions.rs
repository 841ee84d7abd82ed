//! Ordered version snapshot with selection reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::VersionsApi;
use crate::error::StoreError;
use crate::model::{DataType, MethodId, NewVersionRecord, TaskId, Version, VersionId, VersionStatus};

/// Parameters for creating a new version.
#[derive(Debug, Clone)]
pub struct NewVersion {
    /// Parent version; None creates a root (original dataset).
    pub prev_version: Option<VersionId>,
    /// Transformation method applied; None for roots.
    pub method_id: Option<MethodId>,
    /// User-facing label.
    pub name: String,
    /// Opaque transformation parameters.
    pub config: serde_json::Value,
    /// Explicit column classification. Required for roots; derived
    /// versions inherit from the parent when omitted.
    pub data_types: Option<HashMap<String, DataType>>,
}

impl NewVersion {
    /// Creates a root version request carrying its own data types.
    pub fn root(name: impl Into<String>, data_types: HashMap<String, DataType>) -> Self {
        Self {
            prev_version: None,
            method_id: None,
            name: name.into(),
            config: serde_json::Value::Null,
            data_types: Some(data_types),
        }
    }

    /// Creates a derived version request; data types inherit from the parent.
    pub fn derived(name: impl Into<String>, parent: VersionId, method_id: MethodId) -> Self {
        Self {
            prev_version: Some(parent),
            method_id: Some(method_id),
            name: name.into(),
            config: serde_json::Value::Null,
            data_types: None,
        }
    }

    /// Sets the opaque transformation config.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Overrides the inherited data types.
    pub fn with_data_types(mut self, data_types: HashMap<String, DataType>) -> Self {
        self.data_types = Some(data_types);
        self
    }
}

/// Mutable store state, guarded as one unit.
struct StoreState {
    /// Current snapshot, sorted by (created_at, id).
    versions: Vec<Version>,
    /// Active selection; always a member of `versions` when set.
    selected: Option<VersionId>,
    /// Selection requested before its version appeared in a snapshot;
    /// honored by the first refresh that contains it.
    pending_selection: Option<VersionId>,
    /// Last non-fatal error (inheritance degradation, poll hiccups).
    advisory: Option<StoreError>,
}

/// Authoritative, ordered snapshot of one task's versions and the
/// currently selected one.
///
/// Shared between callers and the poll loop behind an `Arc`; all mutation
/// replaces the snapshot wholesale rather than patching entries in place.
pub struct VersionStore {
    api: Arc<dyn VersionsApi>,
    task_id: TaskId,
    state: RwLock<StoreState>,
}

impl VersionStore {
    /// Creates an empty store for one task.
    pub fn new(api: Arc<dyn VersionsApi>, task_id: TaskId) -> Self {
        Self {
            api,
            task_id,
            state: RwLock::new(StoreState {
                versions: Vec::new(),
                selected: None,
                pending_selection: None,
                advisory: None,
            }),
        }
    }

    /// The task this store is scoped to.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the current snapshot in creation order.
    pub async fn snapshot(&self) -> Vec<Version> {
        self.state.read().await.versions.clone()
    }

    /// Returns the version with the given id from the current snapshot.
    pub async fn get(&self, id: VersionId) -> Option<Version> {
        let state = self.state.read().await;
        state.versions.iter().find(|v| v.id == id).cloned()
    }

    /// Returns the currently selected version id.
    pub async fn selected(&self) -> Option<VersionId> {
        self.state.read().await.selected
    }

    /// Takes the last non-fatal error, clearing it.
    pub async fn take_advisory(&self) -> Option<StoreError> {
        self.state.write().await.advisory.take()
    }

    /// Fetches the version list and replaces the snapshot.
    ///
    /// On fetch failure the previous snapshot is retained untouched.
    pub async fn list_versions(&self) -> Result<Vec<Version>, StoreError> {
        let mut fetched = self
            .api
            .list_versions(self.task_id)
            .await
            .map_err(StoreError::Fetch)?;
        sort_by_creation(&mut fetched);

        let mut state = self.state.write().await;
        state.versions = fetched.clone();
        Ok(fetched)
    }

    /// Creates a new version in RAW state.
    ///
    /// A derived version inherits `data_types` from its parent unless the
    /// request overrides them; a failed parent lookup degrades to
    /// `data_types = None` and is recorded as a non-fatal advisory. A root
    /// request without data types fails with a validation error.
    ///
    /// The created version is returned but not inserted into the snapshot;
    /// it appears there with the next successful `refresh`.
    pub async fn create_version(&self, request: NewVersion) -> Result<Version, StoreError> {
        let data_types = match (&request.prev_version, request.data_types) {
            (None, None) => {
                return Err(StoreError::Validation(
                    "a root version must supply data types".to_string(),
                ))
            }
            (_, Some(explicit)) => Some(explicit),
            (Some(parent), None) => self.inherit_data_types(*parent).await,
        };

        let record = NewVersionRecord {
            task_id: self.task_id,
            method_id: request.method_id,
            name: request.name,
            prev_version: request.prev_version,
            config: request.config,
            data_types,
        };

        let version = self
            .api
            .create_version(&record)
            .await
            .map_err(StoreError::Create)?;

        debug!(
            version_id = version.id,
            parent = ?version.prev_version,
            "Created version"
        );

        Ok(version)
    }

    /// Sets the active selection if the id is present in the current
    /// snapshot; otherwise a no-op.
    pub async fn select_version(&self, id: VersionId) {
        let mut state = self.state.write().await;
        if state.versions.iter().any(|v| v.id == id) {
            state.selected = Some(id);
        } else {
            debug!(version_id = id, "Ignoring selection of unknown version");
        }
    }

    /// Re-fetches the list and reconciles the selection.
    ///
    /// Reconciliation priority: (1) the preferred id, if present in the new
    /// snapshot; (2) the previously selected id, if still present; (3) the
    /// earliest version by creation order. A preferred id not yet in the
    /// snapshot is remembered and honored by the first refresh that
    /// contains it. On fetch failure the preference is still recorded and
    /// the last-known-good snapshot is retained.
    pub async fn refresh(
        &self,
        preferred: Option<VersionId>,
    ) -> Result<Vec<Version>, StoreError> {
        if let Some(id) = preferred {
            self.state.write().await.pending_selection = Some(id);
        }

        let fetched = match self.api.list_versions(self.task_id).await {
            Ok(mut list) => {
                sort_by_creation(&mut list);
                list
            }
            Err(e) => {
                warn!(task_id = self.task_id, error = %e, "Refresh failed, keeping snapshot");
                return Err(StoreError::Fetch(e));
            }
        };

        let mut state = self.state.write().await;
        state.versions = fetched.clone();

        let pending_present = state
            .pending_selection
            .filter(|id| fetched.iter().any(|v| v.id == *id));
        let previous_present = state
            .selected
            .filter(|id| fetched.iter().any(|v| v.id == *id));

        state.selected = match pending_present {
            Some(id) => {
                state.pending_selection = None;
                Some(id)
            }
            None => previous_present.or_else(|| fetched.first().map(|v| v.id)),
        };

        Ok(fetched)
    }

    /// Replaces the status of one snapshot entry, rebuilding the snapshot.
    pub async fn set_status(&self, id: VersionId, status: VersionStatus) {
        let mut state = self.state.write().await;
        let rebuilt: Vec<Version> = state
            .versions
            .iter()
            .cloned()
            .map(|mut v| {
                if v.id == id {
                    v.status = status;
                }
                v
            })
            .collect();
        state.versions = rebuilt;
    }

    /// Replaces one snapshot entry with a freshly polled record. Entries
    /// not in the snapshot are ignored; the next refresh picks them up.
    pub async fn apply_polled(&self, polled: Version) {
        let mut state = self.state.write().await;
        if !state.versions.iter().any(|v| v.id == polled.id) {
            debug!(version_id = polled.id, "Polled version not in snapshot");
            return;
        }
        let rebuilt: Vec<Version> = state
            .versions
            .iter()
            .cloned()
            .map(|v| if v.id == polled.id { polled.clone() } else { v })
            .collect();
        state.versions = rebuilt;
    }

    /// Records a non-fatal error for later inspection.
    pub(crate) async fn record_advisory(&self, advisory: StoreError) {
        self.state.write().await.advisory = Some(advisory);
    }

    /// Resolves a parent's data types for inheritance, degrading to None
    /// on lookup failure.
    async fn inherit_data_types(
        &self,
        parent: VersionId,
    ) -> Option<HashMap<String, DataType>> {
        if let Some(parent_version) = self.get(parent).await {
            return parent_version.data_types;
        }

        // Parent not in the snapshot; fall back to a direct fetch.
        match self.api.get_version(parent).await {
            Ok(parent_version) => parent_version.data_types,
            Err(e) => {
                warn!(parent = parent, error = %e, "Parent lookup failed, data types degraded");
                self.record_advisory(StoreError::Inheritance {
                    parent,
                    reason: e.to_string(),
                })
                .await;
                None
            }
        }
    }
}

/// Sorts a fetched list into creation order: (created_at, id).
fn sort_by_creation(versions: &mut [Version]) {
    versions.sort_by_key(|v| (v.created_at, v.id));
}
