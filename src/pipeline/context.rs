//! Session identity for submission requests.

/// Explicit session context bound to an orchestrator at construction.
///
/// Submission requires a valid session; the orchestrator refuses to start
/// a pipeline without one rather than reading ambient state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Backend user identifier, merged into every submission body.
    pub user_id: i64,
    /// Bearer token for the backend.
    pub token: String,
}

impl SessionContext {
    /// Creates a session context.
    pub fn new(user_id: i64, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: token.into(),
        }
    }

    /// A context with an empty token cannot authorize submissions.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty()
    }
}
