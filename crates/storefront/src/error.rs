//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for UI-facing callers. Every failure
//! is classified by [`AppError::kind`] into what the user can do about it;
//! [`AppError::report`] captures the ones worth investigating to Sentry.

use thiserror::Error;

use crate::api::{ApiError, FailureKind};
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::store::StoreError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart or wishlist operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Commerce API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Reading or writing persisted state failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// Bad input from the user.
    #[error("Invalid input: {0}")]
    Validation(String),
}

/// What the user can do about an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the input; nothing was sent or stored.
    Validation,
    /// Sign in again.
    SessionExpired,
    /// Try again.
    Retryable,
    /// The server refused; retrying will not help.
    Rejected,
}

impl AppError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(err) if err.is_validation() => ErrorKind::Validation,
            Self::Store(_) | Self::Storage(_) => ErrorKind::Retryable,
            Self::Api(err) => match (err, err.kind()) {
                (ApiError::Validation(_), _) => ErrorKind::Validation,
                (_, FailureKind::SessionExpired) => ErrorKind::SessionExpired,
                (_, FailureKind::Retryable) => ErrorKind::Retryable,
                (_, FailureKind::Rejected) => ErrorKind::Rejected,
            },
            Self::NotSignedIn => ErrorKind::SessionExpired,
            Self::Config(_) | Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(StoreError::Storage(_)) | Self::Storage(_) => {
                "Could not access your saved data. Please try again.".to_string()
            }
            Self::Store(err) => err.to_string(),
            Self::Api(ApiError::Rejected { message, .. } | ApiError::Server { message, .. }) => {
                message.clone()
            }
            Self::Api(ApiError::Validation(message)) | Self::Validation(message) => message.clone(),
            Self::Api(ApiError::Http(_)) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Api(_) if self.kind() == ErrorKind::Retryable => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Api(_) | Self::NotSignedIn => "Please sign in again.".to_string(),
            Self::Config(err) => err.to_string(),
        }
    }

    /// Capture to Sentry if this is a failure worth investigating.
    ///
    /// Retryable failures are captured; validation, rejection, and expired
    /// sessions are expected and only logged at debug level.
    pub fn report(&self) {
        if self.kind() == ErrorKind::Retryable {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        } else {
            tracing::debug!(error = %self, kind = ?self.kind(), "Operation refused");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after sign-in to associate errors with the customer.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "P1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
