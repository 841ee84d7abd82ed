//! Configuration for the lineage core.
//!
//! Provides connection and polling options loadable from the environment,
//! with validation before any component is constructed.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration shared by the API client and the orchestrator.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the platform backend.
    pub api_base: String,
    /// Interval between poll ticks.
    pub poll_interval: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            poll_interval: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl CoreConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Loads configuration from the environment.
    ///
    /// Reads the following variables:
    /// - `PREPLINE_API_BASE`: backend base URL (required)
    /// - `PREPLINE_POLL_INTERVAL_SECS`: poll interval (default 5)
    /// - `PREPLINE_HTTP_TIMEOUT_SECS`: request timeout (default 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base = env::var("PREPLINE_API_BASE")
            .map_err(|_| ConfigError::MissingEnvVar("PREPLINE_API_BASE".to_string()))?;

        let mut config = Self::default().with_api_base(api_base);

        if let Ok(raw) = env::var("PREPLINE_POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(parse_secs("PREPLINE_POLL_INTERVAL_SECS", &raw)?);
        }
        if let Ok(raw) = env::var("PREPLINE_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_secs("PREPLINE_HTTP_TIMEOUT_SECS", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api_base must not be empty".to_string(),
            ));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ConfigError::ValidationFailed(format!(
                "api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be positive".to_string(),
            ));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "http_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a number of seconds, got '{}'", raw),
    })
}
