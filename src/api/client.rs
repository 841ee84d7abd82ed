//! HTTP client for the platform backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ApiError;
use crate::model::{NewVersionRecord, SubmitRequest, TaskId, Version, VersionId};

/// Trait for backends that persist version records and execute
/// transformations.
#[async_trait]
pub trait VersionsApi: Send + Sync {
    /// Fetch all versions of a task, in creation order.
    async fn list_versions(&self, task_id: TaskId) -> Result<Vec<Version>, ApiError>;

    /// Fetch a single version by id.
    async fn get_version(&self, id: VersionId) -> Result<Version, ApiError>;

    /// Persist a new version record and return it with backend-assigned
    /// fields filled in.
    async fn create_version(&self, record: &NewVersionRecord) -> Result<Version, ApiError>;

    /// Submit a transformation to the remote processor. Any non-2xx
    /// response is an error; the caller must not assume the version
    /// transitioned.
    async fn submit_method(&self, request: &SubmitRequest) -> Result<(), ApiError>;
}

/// Client for the platform's REST backend.
pub struct HttpVersionsApi {
    /// Base URL for the API.
    api_base: String,
    /// Optional bearer token for authentication.
    token: Option<String>,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl HttpVersionsApi {
    /// Create a new client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL for the backend (e.g., "http://localhost:8080")
    /// * `token` - Optional bearer token for authentication
    /// * `timeout` - Per-request timeout
    pub fn new(api_base: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            api_base: api_base.into(),
            token,
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Check if a token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps a non-success response to `ApiError::Status`, reading the body
    /// as best-effort error text.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        Err(ApiError::Status {
            code: status.as_u16(),
            message,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VersionsApi for HttpVersionsApi {
    async fn list_versions(&self, task_id: TaskId) -> Result<Vec<Version>, ApiError> {
        let url = format!("{}/api/tasks/{}/versions", self.api_base, task_id);

        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = Self::check_status(response).await?;
        Self::decode(response).await
    }

    async fn get_version(&self, id: VersionId) -> Result<Version, ApiError> {
        let url = format!("{}/api/versions/{}", self.api_base, id);

        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = Self::check_status(response).await?;
        Self::decode(response).await
    }

    async fn create_version(&self, record: &NewVersionRecord) -> Result<Version, ApiError> {
        let url = format!("{}/api/versions", self.api_base);

        let response = self
            .request(self.http_client.post(&url))
            .json(record)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = Self::check_status(response).await?;
        Self::decode(response).await
    }

    async fn submit_method(&self, request: &SubmitRequest) -> Result<(), ApiError> {
        let url = format!("{}/api/process", self.api_base);

        let response = self
            .request(self.http_client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let api = HttpVersionsApi::new(
            "http://localhost:8080",
            Some("secret".to_string()),
            Duration::from_secs(30),
        );

        assert_eq!(api.api_base(), "http://localhost:8080");
        assert!(api.has_token());

        let api = HttpVersionsApi::new("http://localhost:8080", None, Duration::from_secs(30));
        assert!(!api.has_token());
    }
}
