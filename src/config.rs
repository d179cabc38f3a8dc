//! Client configuration
//!
//! All settings are explicit struct fields. [`ClientConfig::from_env`] is the only place
//! that reads the environment; library calls never look it up on their own.

use std::sync::Arc;
use std::time::Duration;

use crate::timezone::{CentralEuropeanTime, Timezone};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.esios.ree.es";

/// Environment variable holding the API token
pub const TOKEN_ENV_VAR: &str = "ESIOS_TOKEN";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV_VAR: &str = "ESIOS_BASE_URL";

/// Maximum number of transport retries for failed requests.
/// Retries only apply to network errors, 429 and 5xx responses.
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000; // 30 seconds

/// Per-request timeout. The indicator listing is large and slow to produce.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No token given explicitly nor found in the environment
    #[error("missing API token: pass one explicitly or set {TOKEN_ENV_VAR}")]
    MissingToken,

    /// A setting has an unusable value
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Settings for [`crate::EsiosClient`] and its default collaborators
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL without trailing slash
    pub base_url: String,
    /// API token; `None` until given explicitly or read from the environment
    pub token: Option<String>,
    /// Transport retries for transient failures
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Local timezone for every date parameter and decoded timestamp
    pub timezone: Arc<dyn Timezone>,
}

impl ClientConfig {
    /// Defaults without a token
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            max_retries: MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            timezone: Arc::new(CentralEuropeanTime),
        }
    }

    /// Defaults with token and base URL taken from the environment when set
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                config.token = Some(token.trim().to_string());
            }
        }
        if let Ok(base_url) = std::env::var(BASE_URL_ENV_VAR) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }

    /// Override the token; `None` keeps the current (config-sourced) value
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token {
            self.token = Some(token);
        }
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the local timezone
    pub fn with_timezone(mut self, timezone: Arc<dyn Timezone>) -> Self {
        self.timezone = timezone;
        self
    }

    /// Token to authenticate with
    pub fn token(&self) -> Result<&str, ConfigError> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingToken),
        }
    }

    /// Check values before building collaborators
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "base URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue("timeout must be positive".to_string()));
        }
        self.token().map(|_| ())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay_ms = delay_ms.min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}
