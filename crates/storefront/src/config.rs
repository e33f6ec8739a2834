//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DREAMWEAVE_API_URL` - Base URL of the commerce API
//!
//! ## Optional
//! - `DREAMWEAVE_DATA_DIR` - Directory for persisted client state (default: .dreamweave)
//! - `DREAMWEAVE_HTTP_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)
//! - `DREAMWEAVE_CONTACT_SOURCE` - `source` tag on contact submissions (default: website)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_DATA_DIR: &str = ".dreamweave";
const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_CONTACT_SOURCE: &str = "website";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client application configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Commerce API configuration
    pub api: ApiConfig,
    /// Directory holding the persisted cart, wishlist, and session
    pub data_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are resolved relative to it
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// `source` field sent with contact submissions
    pub contact_source: String,
}

impl ApiConfig {
    /// Configuration for `base_url` with default timeout and contact source.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            contact_source: DEFAULT_CONTACT_SOURCE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig::from_env()?;
        let data_dir = PathBuf::from(get_env_or_default("DREAMWEAVE_DATA_DIR", DEFAULT_DATA_DIR));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            api,
            data_dir,
            sentry_dsn,
            sentry_environment,
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("DREAMWEAVE_API_URL", &get_required_env("DREAMWEAVE_API_URL")?)?;
        let timeout = parse_timeout(
            "DREAMWEAVE_HTTP_TIMEOUT_SECS",
            &get_env_or_default("DREAMWEAVE_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?;
        let contact_source = get_env_or_default("DREAMWEAVE_CONTACT_SOURCE", DEFAULT_CONTACT_SOURCE);

        Ok(Self {
            base_url,
            timeout,
            contact_source,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an absolute http(s) base URL.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a positive number of seconds.
fn parse_timeout(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_accepts_https() {
        let url = parse_base_url("TEST_URL", " https://api.dreamweave.in/api ").unwrap();
        assert_eq!(url.host_str(), Some("api.dreamweave.in"));
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        let err = parse_base_url("TEST_URL", "not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "TEST_URL"));
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("TEST_URL", "ftp://files.example.com").is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("T", "45").unwrap(), Duration::from_secs(45));
        assert!(parse_timeout("T", "0").is_err());
        assert!(parse_timeout("T", "-1").is_err());
        assert!(parse_timeout("T", "soon").is_err());
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = get_required_env("DREAMWEAVE_TEST_DEFINITELY_UNSET").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: DREAMWEAVE_TEST_DEFINITELY_UNSET"
        );
    }

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::new(Url::parse("http://127.0.0.1:4000").unwrap());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.contact_source, "website");
    }
}
