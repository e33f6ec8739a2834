//! Application state shared across views.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::{ApiConfig, ClientConfig};
use crate::events::EventBus;
use crate::session::AuthSession;
use crate::storage::{FileStorage, Storage};
use crate::store::CommerceStore;
use crate::tracking::OrderTracker;

/// Application state shared across all views.
///
/// Owns the single storage, store, event bus, API client, session, and
/// order tracker of the process. Cheaply cloneable via `Arc`.
pub struct AppState<S = FileStorage> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    bus: EventBus,
    store: CommerceStore<Arc<S>>,
    client: ApiClient,
    session: AuthSession<Arc<S>>,
    tracker: OrderTracker<ApiClient>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AppState<FileStorage> {
    /// Create the application state from configuration, persisting under
    /// `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_storage(FileStorage::new(config.data_dir.clone()), &config.api)
    }
}

impl<S: Storage> AppState<S> {
    /// Create the application state over an explicit storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_storage(storage: S, api: &ApiConfig) -> Result<Self, ApiError> {
        let storage = Arc::new(storage);
        let bus = EventBus::new();
        let client = ApiClient::new(api)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store: CommerceStore::new(Arc::clone(&storage), bus.clone()),
                session: AuthSession::new(storage, client.clone()),
                tracker: OrderTracker::new(client.clone()),
                client,
                bus,
            }),
        })
    }

    /// Get a reference to the event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Get a reference to the cart and wishlist store.
    #[must_use]
    pub fn store(&self) -> &CommerceStore<Arc<S>> {
        &self.inner.store
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    /// Get a reference to the customer session.
    #[must_use]
    pub fn session(&self) -> &AuthSession<Arc<S>> {
        &self.inner.session
    }

    /// Get a reference to the order tracker.
    #[must_use]
    pub fn tracker(&self) -> &OrderTracker<ApiClient> {
        &self.inner.tracker
    }
}
