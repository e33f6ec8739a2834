//! Durable client-side key-value storage.
//!
//! # Records
//!
//! Four named records survive a process restart and are loaded lazily on
//! first access:
//!
//! - [`keys::CART`] - cart snapshot
//! - [`keys::WISHLIST`] - wishlist snapshot
//! - [`keys::USER`] - signed-in user profile
//! - [`keys::TOKEN`] - bearer token for the commerce API
//!
//! Values are JSON documents. A record that fails to parse is treated as
//! absent: the owner logs a warning and starts from its empty default. A
//! record that cannot be read is an error, never an empty default.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Storage keys for persisted client state.
pub mod keys {
    /// Key for the cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the wishlist snapshot.
    pub const WISHLIST: &str = "wishlist";

    /// Key for the signed-in user profile.
    pub const USER: &str = "user";

    /// Key for the commerce API bearer token.
    pub const TOKEN: &str = "token";
}

/// Errors that can occur when reading or writing a storage record.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on record {key}: {source}")]
    Io {
        /// Record key.
        key: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Key contains characters that cannot name a record.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Value could not be serialized.
    #[error("failed to encode record {key}: {source}")]
    Encode {
        /// Record key.
        key: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Durable key-value storage.
///
/// Implementations must make `write` atomic per key: after it returns `Ok`,
/// a subsequent `read` (in this or a later process) observes the new value,
/// and after it returns `Err` the previous value is still intact.
pub trait Storage: Send + Sync + 'static {
    /// Read a record, returning `None` if it does not exist.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Replace a record.
    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a record. Deleting an absent record is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: Storage> Storage for Arc<S> {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).remove(key)
    }
}

/// Load a JSON record, falling back to `T::default()` when the record is
/// missing or corrupt.
///
/// # Errors
///
/// Returns [`StorageError`] if the record could not be read at all. The
/// caller must not treat that as an empty record, or its next write would
/// replace data it never saw.
pub(crate) async fn read_json_or_default<S, T>(storage: &S, key: &str) -> Result<T, StorageError>
where
    S: Storage,
    T: DeserializeOwned + Default,
{
    Ok(read_json(storage, key).await?.unwrap_or_default())
}

/// Load a JSON record. Missing and corrupt records both yield `Ok(None)`;
/// a corrupt one is logged.
///
/// # Errors
///
/// Returns [`StorageError`] if the underlying read fails.
pub(crate) async fn read_json<S, T>(storage: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: Storage,
    T: DeserializeOwned,
{
    let Some(raw) = storage.read(key).await? else {
        tracing::debug!(key, "No persisted record");
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(
                key,
                error = %e,
                body = %raw.chars().take(200).collect::<String>(),
                "Corrupt persisted record, using default"
            );
            Ok(None)
        }
    }
}

/// Serialize and write a JSON record.
pub(crate) async fn write_json<S, T>(storage: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: Storage,
    T: Serialize + Sync,
{
    let body = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    storage.write(key, &body).await
}

/// Validate that a key can safely name a record.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key(keys::CART).is_ok());
        assert!(validate_key("order-cache_2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
    }

    #[tokio::test]
    async fn test_read_json_corrupt_falls_back() {
        let storage = MemoryStorage::new();
        storage.write(keys::WISHLIST, "{not json").await.unwrap();

        let value: Vec<String> = read_json_or_default(&storage, keys::WISHLIST).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_json() {
        let storage = MemoryStorage::new();
        write_json(&storage, keys::WISHLIST, &vec!["P1".to_string()])
            .await
            .unwrap();

        let value: Option<Vec<String>> = read_json(&storage, keys::WISHLIST).await.unwrap();
        assert_eq!(value, Some(vec!["P1".to_string()]));
    }

    #[tokio::test]
    async fn test_read_json_invalid_key_is_an_error() {
        let storage = MemoryStorage::new();
        let result: Result<Option<Vec<String>>, _> = read_json(&storage, "../cart").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
