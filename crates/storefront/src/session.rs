//! Signed-in customer session.
//!
//! The profile and bearer token are persisted under [`keys::USER`] and
//! [`keys::TOKEN`] so a session survives restarts. They are read on first
//! access; a restored token is pushed into the [`ApiClient`] at that point.
//!
//! The token is stored as a plain JSON string. The data directory must be
//! private to the user.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, UserProfile};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::storage::{self, Storage, StorageError, keys};

/// Persisted customer session.
///
/// Cheaply cloneable via `Arc`; clones share state.
pub struct AuthSession<S> {
    inner: Arc<SessionInner<S>>,
}

struct SessionInner<S> {
    storage: S,
    client: ApiClient,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    restored: bool,
    user: Option<UserProfile>,
}

impl<S> Clone for AuthSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> AuthSession<S> {
    /// Create a session over `storage` that authenticates `client`.
    #[must_use]
    pub fn new(storage: S, client: ApiClient) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                storage,
                client,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// The signed-in customer, if any.
    pub async fn current_user(&self) -> Option<UserProfile> {
        let mut state = self.inner.state.lock().await;
        self.restore(&mut state).await;
        state.user.clone()
    }

    /// Whether a customer is signed in.
    pub async fn is_logged_in(&self) -> bool {
        self.current_user().await.is_some()
    }

    /// Sign in and persist the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected, the request fails,
    /// or the session cannot be persisted. On error the previous session, if
    /// any, is left in place, in memory and on disk.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<UserProfile> {
        let mut state = self.inner.state.lock().await;

        let auth = self.inner.client.login(email, password).await?;
        let token = SecretString::from(auth.token);

        let previous_token = self.inner.storage.read(keys::TOKEN).await?;
        storage::write_json(&self.inner.storage, keys::TOKEN, &token.expose_secret()).await?;
        if let Err(e) = storage::write_json(&self.inner.storage, keys::USER, &auth.user).await {
            self.roll_back_token(previous_token.as_deref()).await;
            return Err(e.into());
        }

        self.inner.client.set_token(token).await;
        set_sentry_user(&auth.user.id, Some(&auth.user.email));
        info!(user_id = %auth.user.id, "Signed in");

        state.restored = true;
        state.user = Some(auth.user.clone());
        Ok(auth.user)
    }

    /// Sign out: forget the token and profile.
    ///
    /// The in-memory session and client token are always cleared, even if
    /// removing the persisted records fails.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted record could not be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> std::result::Result<(), StorageError> {
        let mut state = self.inner.state.lock().await;

        self.inner.client.remove_token().await;
        clear_sentry_user();
        state.restored = true;
        state.user = None;

        let token_removed = self.inner.storage.remove(keys::TOKEN).await;
        let user_removed = self.inner.storage.remove(keys::USER).await;
        info!("Signed out");
        token_removed.and(user_removed)
    }

    /// End the session after the server rejected its token.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted record could not be removed.
    pub async fn handle_session_expired(&self) -> std::result::Result<(), StorageError> {
        warn!("Session expired; signing out");
        self.logout().await
    }

    /// Put back the token record that a failed login replaced. If that
    /// fails too, drop the record so the profile left on disk is never paired
    /// with another user's token.
    async fn roll_back_token(&self, previous: Option<&str>) {
        let restored = match previous {
            Some(raw) => self.inner.storage.write(keys::TOKEN, raw).await,
            None => self.inner.storage.remove(keys::TOKEN).await,
        };
        if let Err(e) = restored {
            warn!(error = %e, "Failed to restore previous token record, removing it");
            if let Err(e) = self.inner.storage.remove(keys::TOKEN).await {
                tracing::error!(error = %e, "Failed to remove token record after failed login");
            }
        }
    }

    /// Restore from storage on first access. A read failure leaves the
    /// session signed out for now and retries on the next access.
    async fn restore(&self, state: &mut SessionState) {
        if state.restored {
            return;
        }

        let records = async {
            let profile: Option<UserProfile> = storage::read_json(&self.inner.storage, keys::USER).await?;
            let token: Option<String> = storage::read_json(&self.inner.storage, keys::TOKEN).await?;
            Ok::<_, StorageError>((profile, token))
        };
        let (profile, token) = match records.await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                return;
            }
        };

        state.user = match (profile, token) {
            (Some(profile), Some(token)) if !token.is_empty() => {
                self.inner.client.set_token(SecretString::from(token)).await;
                set_sentry_user(&profile.id, Some(&profile.email));
                tracing::debug!(user_id = %profile.id, "Session restored");
                Some(profile)
            }
            (None, None) => None,
            _ => {
                warn!("Incomplete persisted session, treating as signed out");
                None
            }
        };
        state.restored = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::config::ApiConfig;
    use crate::storage::MemoryStorage;

    /// Storage that fails writes and reads for chosen keys.
    #[derive(Clone, Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        failing_writes: Arc<StdMutex<Vec<&'static str>>>,
        failing_reads: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl FlakyStorage {
        fn fail_writes_to(&self, key: &'static str) {
            self.failing_writes.lock().unwrap().push(key);
        }

        fn fail_reads_of(&self, key: &'static str) {
            self.failing_reads.lock().unwrap().push(key);
        }

        fn heal(&self) {
            self.failing_writes.lock().unwrap().clear();
            self.failing_reads.lock().unwrap().clear();
        }

        fn io_error(key: &str) -> StorageError {
            StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            }
        }
    }

    impl Storage for FlakyStorage {
        async fn read(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
            if self.failing_reads.lock().unwrap().iter().any(|k| *k == key) {
                return Err(Self::io_error(key));
            }
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
            if self.failing_writes.lock().unwrap().iter().any(|k| *k == key) {
                return Err(Self::io_error(key));
            }
            self.inner.write(key, value).await
        }

        async fn remove(&self, key: &str) -> std::result::Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    fn client() -> ApiClient {
        ApiClient::new(&ApiConfig::new(Url::parse("http://127.0.0.1:9").unwrap())).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: "U1".into(),
            name: "Ananya Rao".to_string(),
            email: "ananya@example.com".to_string(),
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_restores_persisted_session() {
        let storage = MemoryStorage::new();
        storage::write_json(&storage, keys::USER, &profile()).await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"jwt").await.unwrap();
        let client = client();
        let session = AuthSession::new(storage, client.clone());

        assert!(!client.has_token().await);
        assert_eq!(session.current_user().await, Some(profile()));
        assert!(client.has_token().await);
    }

    #[tokio::test]
    async fn test_corrupt_profile_is_signed_out() {
        let storage = MemoryStorage::new();
        storage.write(keys::USER, "{\"id\":").await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"jwt").await.unwrap();
        let client = client();
        let session = AuthSession::new(storage, client.clone());

        assert!(!session.is_logged_in().await);
        assert!(!client.has_token().await);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let storage = MemoryStorage::new();
        storage::write_json(&storage, keys::USER, &profile()).await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"jwt").await.unwrap();
        let client = client();
        let session = AuthSession::new(storage.clone(), client.clone());
        assert!(session.is_logged_in().await);

        session.handle_session_expired().await.unwrap();

        assert!(!session.is_logged_in().await);
        assert!(!client.has_token().await);
        assert!(storage.is_empty());

        session.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_session_by_default() {
        let session = AuthSession::new(MemoryStorage::new(), client());
        assert_eq!(session.current_user().await, None);
    }

    #[tokio::test]
    async fn test_unreadable_session_retries_on_next_access() {
        let storage = FlakyStorage::default();
        storage::write_json(&storage, keys::USER, &profile()).await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"jwt").await.unwrap();
        storage.fail_reads_of(keys::TOKEN);
        let client = client();
        let session = AuthSession::new(storage.clone(), client.clone());

        assert!(!session.is_logged_in().await);
        assert!(!client.has_token().await);

        storage.heal();
        assert_eq!(session.current_user().await, Some(profile()));
        assert!(client.has_token().await);
    }

    #[tokio::test]
    async fn test_roll_back_restores_previous_token() {
        let storage = FlakyStorage::default();
        storage::write_json(&storage, keys::USER, &profile()).await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"tok-A").await.unwrap();
        let session = AuthSession::new(storage.clone(), client());

        storage::write_json(&storage, keys::TOKEN, &"tok-B").await.unwrap();
        session.roll_back_token(Some("\"tok-A\"")).await;

        let token: Option<String> = storage::read_json(&storage, keys::TOKEN).await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-A"));
    }

    #[tokio::test]
    async fn test_roll_back_without_previous_removes_token() {
        let storage = FlakyStorage::default();
        storage::write_json(&storage, keys::TOKEN, &"tok-B").await.unwrap();
        let session = AuthSession::new(storage.clone(), client());

        session.roll_back_token(None).await;
        assert_eq!(storage.read(keys::TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_roll_back_drops_token_record() {
        let storage = FlakyStorage::default();
        storage::write_json(&storage, keys::USER, &profile()).await.unwrap();
        storage::write_json(&storage, keys::TOKEN, &"tok-B").await.unwrap();
        storage.fail_writes_to(keys::TOKEN);
        let session = AuthSession::new(storage.clone(), client());

        session.roll_back_token(Some("\"tok-A\"")).await;

        assert_eq!(storage.read(keys::TOKEN).await.unwrap(), None);
        assert!(!session.is_logged_in().await);
    }
}
