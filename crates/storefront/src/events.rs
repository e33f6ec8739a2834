//! Change notification for the commerce store.
//!
//! Independently mounted UI regions observe store mutations through an
//! [`EventBus`] instead of threading state through every layer. Events
//! carry no payload; a listener re-reads whatever it needs from the store,
//! which also makes duplicate deliveries harmless.
//!
//! # Lifetimes
//!
//! [`EventBus::subscribe`] returns a [`Subscription`] guard. Dropping the
//! guard unregisters the listener, so a view that owns its guard can never be
//! notified after it is torn down.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use dreamweave_storefront::events::{EventBus, StoreEvent};
//!
//! let bus = EventBus::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&hits);
//! let subscription = bus.subscribe(StoreEvent::CartUpdated, move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.publish(StoreEvent::CartUpdated);
//! drop(subscription);
//! bus.publish(StoreEvent::CartUpdated);
//!
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Events published by the commerce store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    /// The cart changed.
    CartUpdated,
    /// The wishlist changed.
    WishlistUpdated,
}

impl StoreEvent {
    /// The event name as used by the storefront views.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CartUpdated => "cartUpdated",
            Self::WishlistUpdated => "wishlistUpdated",
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<StoreEvent, Vec<(u64, Listener)>>,
}

impl Registry {
    /// Remove a listener, handing it back so the caller can drop it after
    /// releasing the lock (its captures may own other subscriptions).
    fn remove(&mut self, event: StoreEvent, id: u64) -> Option<Listener> {
        let entries = self.listeners.get_mut(&event)?;
        let position = entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(entries.remove(position).1)
    }
}

/// Process-wide notification channel, one logical channel per [`StoreEvent`].
///
/// Cheaply cloneable; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field(
                "listeners",
                &registry
                    .listeners
                    .iter()
                    .map(|(event, entries)| (event.as_str(), entries.len()))
                    .collect::<HashMap<_, _>>(),
            )
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`.
    ///
    /// The listener stays registered until the returned guard is dropped or
    /// [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription immediately unregisters the listener"]
    pub fn subscribe<F>(&self, event: StoreEvent, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(event)
            .or_default()
            .push((id, Arc::new(listener)));

        tracing::debug!(event = %event, listener_id = id, "Listener subscribed");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event,
            id,
            active: true,
        }
    }

    /// Deliver `event` to every listener registered at the time of the call,
    /// synchronously and in registration order.
    ///
    /// The registry is not locked while listeners run, so a listener may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: StoreEvent) {
        let listeners: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .listeners
                .get(&event)
                .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default()
        };

        tracing::debug!(event = %event, listeners = listeners.len(), "Publishing");

        for listener in listeners {
            listener();
        }
    }

    /// Number of listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: StoreEvent) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .get(&event)
            .map_or(0, Vec::len)
    }
}

/// Guard for a registered listener.
///
/// Unregisters on drop. Holds only a weak reference to the bus, so an
/// outstanding guard does not keep a torn-down bus alive.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event: StoreEvent,
    id: u64,
    active: bool,
}

impl Subscription {
    /// The event this subscription listens to.
    #[must_use]
    pub const fn event(&self) -> StoreEvent {
        self.event
    }

    /// Unregister the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        if let Some(registry) = self.registry.upgrade() {
            let removed = registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.event, self.id);
            if removed.is_some() {
                tracing::debug!(event = %self.event, listener_id = self.id, "Listener unsubscribed");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
