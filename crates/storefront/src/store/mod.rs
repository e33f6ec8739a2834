//! Local commerce store: sole owner of the cart and wishlist.
//!
//! # Persistence
//!
//! Every mutation follows the same sequence while holding the store lock:
//!
//! 1. Load the record from storage if this is the first access.
//! 2. Apply the mutation to a copy.
//! 3. Persist the copy.
//! 4. Commit the copy to memory.
//! 5. Publish the change event.
//!
//! A failed write returns [`StoreError::Storage`] before step 4, so memory
//! never runs ahead of storage and no event is published.
//!
//! A record that cannot be read is never cached. Reads show the empty
//! default for that call only; mutations fail with [`StoreError::Storage`]
//! so a snapshot that was never seen is not overwritten. The next access
//! retries the read.
//!
//! A snapshot repaired on load (duplicate lines, zero quantities) is written
//! back immediately so memory and storage agree.
//!
//! # Ordering
//!
//! The lock is a `tokio::sync::Mutex`, which queues waiters in FIFO order.
//! Mutations therefore persist and notify in the order they were issued,
//! even though each write suspends.
//!
//! Listeners run while the lock is held. They must not wait on the store
//! from inside the callback; a listener that needs fresh totals should
//! schedule a read (e.g., spawn a task calling [`CommerceStore::cart`]).

mod cart;
mod wishlist;

pub use cart::{AddOptions, Cart, CartLine, LineKey, ProductSnapshot};
pub use wishlist::Wishlist;

use std::sync::Arc;

use dreamweave_core::{PriceError, ProductId};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::instrument;

use crate::error::add_breadcrumb;
use crate::events::{EventBus, StoreEvent, Subscription};
use crate::storage::{self, Storage, StorageError, keys};

/// Errors returned by store mutations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested quantity is not allowed (zero on add, or out of range).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Adding would overflow the line quantity.
    #[error("quantity overflow for cart line {0}")]
    QuantityOverflow(String),

    /// The change would make the cart total unrepresentable.
    #[error("cart total too large after changing line {0}")]
    TotalOverflow(String),

    /// Unit price is invalid.
    #[error("invalid price: {0}")]
    InvalidPrice(#[from] PriceError),

    /// Loading or persisting the snapshot failed; the mutation was not
    /// applied.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Whether this is a local validation failure (never reached storage).
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[derive(Default)]
struct StoreState {
    cart: Option<Cart>,
    wishlist: Option<Wishlist>,
}

/// Cart and wishlist store.
///
/// Cheaply cloneable via `Arc`; clones share state, storage and bus.
pub struct CommerceStore<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    storage: S,
    bus: EventBus,
    state: Mutex<StoreState>,
}

impl<S> Clone for CommerceStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Storage> CommerceStore<S> {
    /// Create a store over `storage`, publishing on `bus`.
    ///
    /// Nothing is read until the first access.
    #[must_use]
    pub fn new(storage: S, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                storage,
                bus,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// The bus this store publishes on.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Register a listener for a store event.
    #[must_use = "dropping the subscription immediately unregisters the listener"]
    pub fn subscribe<F>(&self, event: StoreEvent, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(event, listener)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Current cart snapshot.
    pub async fn cart(&self) -> Cart {
        self.read_cart(Cart::clone).await
    }

    /// Sum of quantities over all lines.
    pub async fn total_items(&self) -> u64 {
        self.read_cart(Cart::total_items).await
    }

    /// Sum of `unit_price × quantity` over all lines.
    pub async fn total_price(&self) -> Decimal {
        self.read_cart(Cart::total_price).await
    }

    /// Add units of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero quantity, an overflowing line
    /// or an overflowing cart total, and [`StoreError::Storage`] if the
    /// snapshot cannot be loaded or persisted.
    #[instrument(skip(self, product), fields(product_id = %product.id, quantity = options.quantity))]
    pub async fn add_to_cart(&self, product: &ProductSnapshot, options: AddOptions) -> Result<(), StoreError> {
        self.mutate_cart("Added to cart", product.id.as_str(), |cart| {
            cart.add(product, &options)?;
            Ok(true)
        })
        .await
    }

    /// Set a line's quantity. Zero or less removes the line; an unknown key
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidQuantity`] if `quantity` exceeds the line
    /// limit, [`StoreError::TotalOverflow`] if the cart total would overflow,
    /// and [`StoreError::Storage`] if the snapshot cannot be loaded or
    /// persisted.
    #[instrument(skip(self), fields(line = %key))]
    pub async fn update_quantity(&self, key: &LineKey, quantity: i64) -> Result<(), StoreError> {
        self.mutate_cart("Updated quantity", key.product_id.as_str(), |cart| {
            cart.set_quantity(key, quantity)
        })
        .await
    }

    /// Remove a line. Removing an absent line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the snapshot cannot be persisted.
    #[instrument(skip(self), fields(line = %key))]
    pub async fn remove_from_cart(&self, key: &LineKey) -> Result<(), StoreError> {
        self.mutate_cart("Removed from cart", key.product_id.as_str(), |cart| {
            Ok(cart.remove(key))
        })
        .await
    }

    /// Empty the cart.
    ///
    /// Always persists, so a corrupt snapshot on disk is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the snapshot cannot be persisted.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), StoreError> {
        self.mutate_cart("Cleared cart", "", |cart| {
            cart.clear();
            Ok(true)
        })
        .await
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Current wishlist snapshot.
    pub async fn wishlist(&self) -> Wishlist {
        self.read_wishlist(Wishlist::clone).await
    }

    /// Whether `id` is on the wishlist.
    pub async fn is_wishlisted(&self, id: &ProductId) -> bool {
        self.read_wishlist(|wishlist| wishlist.contains(id)).await
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now
    /// on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the snapshot cannot be persisted.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn toggle_wishlist(&self, id: &ProductId) -> Result<bool, StoreError> {
        let mut state = self.inner.state.lock().await;
        let mut next = self.loaded_wishlist(&mut state).await?.clone();
        let saved = next.toggle(id);

        self.commit_wishlist(&mut state, next).await?;
        add_breadcrumb(
            "wishlist",
            if saved { "Saved to wishlist" } else { "Removed from wishlist" },
            Some(&[("product_id", id.as_str())]),
        );
        self.inner.bus.publish(StoreEvent::WishlistUpdated);
        Ok(saved)
    }

    /// Empty the wishlist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the snapshot cannot be persisted.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock().await;
        let mut next = self.loaded_wishlist(&mut state).await?.clone();
        next.clear();

        self.commit_wishlist(&mut state, next).await?;
        add_breadcrumb("wishlist", "Cleared wishlist", None);
        self.inner.bus.publish(StoreEvent::WishlistUpdated);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply `apply` to a copy of the cart; if it reports a change, persist,
    /// commit and publish.
    async fn mutate_cart<F>(&self, action: &str, product_id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Cart) -> Result<bool, StoreError>,
    {
        let mut state = self.inner.state.lock().await;
        let mut next = self.loaded_cart(&mut state).await?.clone();

        if !apply(&mut next)? {
            tracing::debug!(action, "Cart unchanged, nothing to persist");
            return Ok(());
        }

        storage::write_json(&self.inner.storage, keys::CART, &next).await?;
        state.cart = Some(next);

        let data = [("product_id", product_id)];
        add_breadcrumb(
            "cart",
            action,
            (!product_id.is_empty()).then_some(data.as_slice()),
        );
        self.inner.bus.publish(StoreEvent::CartUpdated);
        Ok(())
    }

    async fn commit_wishlist(
        &self,
        state: &mut MutexGuard<'_, StoreState>,
        next: Wishlist,
    ) -> Result<(), StoreError> {
        storage::write_json(&self.inner.storage, keys::WISHLIST, &next).await?;
        state.wishlist = Some(next);
        Ok(())
    }

    async fn read_cart<R>(&self, read: impl FnOnce(&Cart) -> R) -> R {
        let mut state = self.inner.state.lock().await;
        match self.loaded_cart(&mut state).await {
            Ok(cart) => read(cart),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cart, showing it empty");
                read(&Cart::default())
            }
        }
    }

    async fn read_wishlist<R>(&self, read: impl FnOnce(&Wishlist) -> R) -> R {
        let mut state = self.inner.state.lock().await;
        match self.loaded_wishlist(&mut state).await {
            Ok(wishlist) => read(wishlist),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load wishlist, showing it empty");
                read(&Wishlist::default())
            }
        }
    }

    async fn loaded_cart<'a>(&self, state: &'a mut StoreState) -> Result<&'a Cart, StorageError> {
        if state.cart.is_none() {
            let mut cart: Cart = storage::read_json_or_default(&self.inner.storage, keys::CART).await?;
            if cart.normalize() {
                tracing::warn!("Persisted cart contained invalid lines, repairing");
                self.write_back(keys::CART, &cart).await;
            }
            if cart.checked_total_price().is_none() {
                tracing::warn!("Persisted cart total is out of range, using empty cart");
                cart = Cart::default();
            }
            tracing::debug!(lines = cart.lines().len(), "Cart loaded");
            state.cart = Some(cart);
        }
        Ok(state.cart.get_or_insert_with(Cart::default))
    }

    async fn loaded_wishlist<'a>(
        &self,
        state: &'a mut StoreState,
    ) -> Result<&'a Wishlist, StorageError> {
        if state.wishlist.is_none() {
            let mut wishlist: Wishlist =
                storage::read_json_or_default(&self.inner.storage, keys::WISHLIST).await?;
            if wishlist.normalize() {
                tracing::warn!("Persisted wishlist contained duplicates, repairing");
                self.write_back(keys::WISHLIST, &wishlist).await;
            }
            tracing::debug!(items = wishlist.len(), "Wishlist loaded");
            state.wishlist = Some(wishlist);
        }
        Ok(state.wishlist.get_or_insert_with(Wishlist::default))
    }

    /// Persist a snapshot repaired on load. Failure leaves the repair in
    /// memory only; the next mutation writes it.
    async fn write_back<T: serde::Serialize + Sync>(&self, key: &str, repaired: &T) {
        if let Err(e) = storage::write_json(&self.inner.storage, key, repaired).await {
            tracing::warn!(key, error = %e, "Failed to persist repaired snapshot");
        }
    }
}
