//! Client for the Dreamweave commerce API.
//!
//! # Architecture
//!
//! - JSON over HTTP via `reqwest` 0.13
//! - Bearer token attached to every request once set; removed on logout
//! - Every request carries a fresh `X-Request-Id` for correlation
//! - No automatic retries: failures are classified by [`ApiError::kind`] and
//!   retrying is left to the caller
//!
//! # Example
//!
//! ```rust,ignore
//! use dreamweave_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.api)?;
//! client.set_token(token).await;
//!
//! let orders = client.get_orders(&user_id).await?;
//! let tracking = client.get_order_tracking(&orders[0].id).await?;
//! ```

mod client;
pub mod types;

pub use client::ApiClient;
pub use types::*;

use reqwest::StatusCode;
use thiserror::Error;

use types::ErrorBody;

/// Longest slice of a non-JSON error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// How a caller should react to a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The token was rejected; the session must end.
    SessionExpired,
    /// Transient; the same request may succeed if retried by the user.
    Retryable,
    /// The server refused the request; retrying will not help.
    Rejected,
}

/// Errors that can occur when calling the commerce API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 401.
    #[error("Session expired")]
    SessionExpired,

    /// The server returned a 5xx status.
    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    /// The server returned a 4xx status other than 401.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Input was rejected locally before any request was sent.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The base URL could not be combined with an endpoint path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Classify this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::SessionExpired => FailureKind::SessionExpired,
            Self::Server { .. } | Self::Http(_) | Self::Parse(_) => FailureKind::Retryable,
            Self::Rejected { .. } | Self::Validation(_) | Self::InvalidUrl(_) => FailureKind::Rejected,
        }
    }

    /// Build the error for a non-success status and its body.
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return Self::SessionExpired;
        }
        let message = error_message(status, body);
        if status.is_server_error() {
            Self::Server { status, message }
        } else {
            Self::Rejected { status, message }
        }
    }
}

/// Extract a human-readable message from an error response body.
///
/// Prefers the `message` field, then `error`, then the first
/// [`MAX_ERROR_BODY_CHARS`] characters of the raw body, then the status
/// reason phrase.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let field = parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| parsed.error.filter(|e| !e.trim().is_empty()));
        if let Some(message) = field {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
