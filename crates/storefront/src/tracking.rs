//! Order tracking reconciler.
//!
//! Keeps the order shown on the order-detail view in step with the carrier.
//! Tracking is a best-effort overlay on an order that is already displayed:
//!
//! - a refresh that returns an order replaces the displayed one wholesale
//! - a refresh that returns only an error keeps the displayed order and
//!   records the error, which is shown only once an AWB is known
//! - a transport or server failure is recorded the same way
//! - an expired session is reported to the caller and never shown as a
//!   tracking error
//!
//! Each opened view has a generation. [`OrderTracker::open`],
//! [`OrderTracker::load`], and [`OrderTracker::close`] start a new one, and a
//! response that arrives for an older generation is dropped. At most one
//! tracking request per order is in flight for a generation; further
//! refreshes are coalesced into it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use dreamweave_core::OrderId;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, ApiError, FailureKind, Order, TrackingResponse};

/// Where tracking data comes from.
pub trait TrackingSource: Send + Sync + 'static {
    /// Fetch an order by ID.
    fn fetch_order(&self, order_id: &OrderId) -> impl Future<Output = Result<Order, ApiError>> + Send;

    /// Ask the carrier for the latest state of an order.
    fn fetch_tracking(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<TrackingResponse, ApiError>> + Send;
}

impl TrackingSource for ApiClient {
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, ApiError> {
        self.get_order(order_id).await
    }

    async fn fetch_tracking(&self, order_id: &OrderId) -> Result<TrackingResponse, ApiError> {
        self.get_order_tracking(order_id).await
    }
}

/// The order as currently displayed, plus the last tracking error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingView {
    order: Order,
    error: Option<String>,
}

impl TrackingView {
    fn new(order: Order) -> Self {
        Self { order, error: None }
    }

    /// The displayed order.
    #[must_use]
    pub const fn order(&self) -> &Order {
        &self.order
    }

    /// The tracking error to show, if any.
    ///
    /// Suppressed until the carrier has issued an AWB: before that, a failed
    /// lookup is the expected state, not a problem.
    #[must_use]
    pub fn visible_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|_| self.order.has_awb())
    }

    /// What the tracking panel shows.
    #[must_use]
    pub fn panel(&self) -> TrackingPanel {
        let Some(awb) = self.order.awb() else {
            return TrackingPanel::NoTrackingYet;
        };
        match &self.error {
            Some(error) => TrackingPanel::TrackingStale {
                awb: awb.to_string(),
                error: error.clone(),
            },
            None => TrackingPanel::TrackingAvailable { awb: awb.to_string() },
        }
    }

    /// Whether the order is delivered or cancelled. Refreshing is still
    /// allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.order.status.is_terminal()
    }
}

/// State of the tracking panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingPanel {
    /// No AWB has been issued yet.
    NoTrackingYet,
    /// The AWB is known and the last refresh succeeded.
    TrackingAvailable { awb: String },
    /// The AWB is known but the last refresh failed.
    TrackingStale { awb: String, error: String },
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response was applied; this is the new view.
    Applied(TrackingView),
    /// The order has no carrier reference yet, so nothing was fetched.
    NotShipped,
    /// A refresh for this order is already running; nothing was fetched.
    InFlight,
    /// The view was closed or re-opened while the request ran; the response
    /// was dropped.
    Stale,
    /// No view is open for this order.
    NotOpen,
    /// The server rejected the session token.
    SessionExpired,
}

#[derive(Debug, Default)]
struct TrackerState {
    generation: u64,
    view: Option<TrackingView>,
    /// Order ID to the generation its in-flight request belongs to.
    in_flight: HashMap<OrderId, u64>,
}

/// Reconciles the displayed order with carrier tracking.
pub struct OrderTracker<S> {
    source: S,
    state: Mutex<TrackerState>,
}

impl<S> std::fmt::Debug for OrderTracker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTracker")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: TrackingSource> OrderTracker<S> {
    /// Create a tracker with no open view.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// The currently displayed view, if one is open.
    #[must_use]
    pub fn view(&self) -> Option<TrackingView> {
        self.lock().view.clone()
    }

    /// Display an already-fetched order and refresh its tracking if it has
    /// been handed to a carrier.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn open(&self, order: Order) -> RefreshOutcome {
        let order_id = order.id.clone();
        {
            let mut state = self.lock();
            state.generation += 1;
            state.view = Some(TrackingView::new(order));
        }
        self.refresh(&order_id).await
    }

    /// Fetch an order, display it, and refresh its tracking.
    ///
    /// # Errors
    ///
    /// Returns an error if the order itself cannot be fetched. Tracking
    /// failures are folded into the view instead.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn load(&self, order_id: &OrderId) -> Result<RefreshOutcome, ApiError> {
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.view = None;
            state.generation
        };

        let order = self.source.fetch_order(order_id).await?;

        {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("View changed while loading; dropping order");
                return Ok(RefreshOutcome::Stale);
            }
            state.view = Some(TrackingView::new(order));
        }
        Ok(self.refresh(order_id).await)
    }

    /// Tear down the view. Responses still in flight will be dropped.
    pub fn close(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.view = None;
    }

    /// Re-fetch tracking for the displayed order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn refresh(&self, order_id: &OrderId) -> RefreshOutcome {
        let generation = {
            let mut state = self.lock();
            let generation = state.generation;
            match &state.view {
                Some(view) if &view.order.id == order_id => {
                    if !view.order.has_carrier_reference() {
                        return RefreshOutcome::NotShipped;
                    }
                }
                _ => return RefreshOutcome::NotOpen,
            }
            if state.in_flight.get(order_id) == Some(&generation) {
                debug!("Tracking refresh already in flight");
                return RefreshOutcome::InFlight;
            }
            state.in_flight.insert(order_id.clone(), generation);
            generation
        };

        let result = self.source.fetch_tracking(order_id).await;

        let mut state = self.lock();
        if state.in_flight.get(order_id) == Some(&generation) {
            state.in_flight.remove(order_id);
        }
        if state.generation != generation {
            debug!("View changed during refresh; dropping response");
            return RefreshOutcome::Stale;
        }
        let Some(view) = state.view.as_mut() else {
            return RefreshOutcome::Stale;
        };

        match result {
            Ok(TrackingResponse { order: Some(order), .. }) if &order.id != order_id => {
                warn!(returned = %order.id, "Tracking response is for another order; ignoring it");
            }
            Ok(TrackingResponse { order: Some(order), error }) => {
                debug!(status = %order.status, events = order.tracking_events.len(), "Order refreshed");
                view.order = order;
                view.error = error;
            }
            Ok(TrackingResponse { order: None, error: Some(error) }) => {
                debug!(error = %error, "Tracking returned no update");
                view.error = Some(error);
            }
            Ok(TrackingResponse { order: None, error: None }) => {
                view.error = None;
            }
            Err(err) if err.kind() == FailureKind::SessionExpired => {
                return RefreshOutcome::SessionExpired;
            }
            Err(err) => {
                warn!(error = %err, "Tracking refresh failed");
                view.error = Some(refresh_failure_message(&err));
            }
        }
        RefreshOutcome::Applied(view.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn refresh_failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Server { message, .. } | ApiError::Rejected { message, .. } => {
            format!("Could not refresh tracking: {message}. Please try again.")
        }
        _ => "Could not refresh tracking. Please try again.".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dreamweave_core::OrderStatus;
    use reqwest::StatusCode;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::types::tests::order;

    /// Scripted tracking source. When gated, each tracking fetch signals
    /// `started` and waits for `release`.
    #[derive(Default)]
    struct FakeSource {
        orders: Mutex<VecDeque<Result<Order, ApiError>>>,
        tracking: Mutex<VecDeque<Result<TrackingResponse, ApiError>>>,
        tracking_calls: AtomicUsize,
        gated: bool,
        started: Notify,
        release: Notify,
    }

    impl FakeSource {
        fn with_tracking(responses: Vec<Result<TrackingResponse, ApiError>>) -> Self {
            Self {
                tracking: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.tracking_calls.load(Ordering::SeqCst)
        }
    }

    impl TrackingSource for FakeSource {
        async fn fetch_order(&self, _order_id: &OrderId) -> Result<Order, ApiError> {
            self.orders.lock().unwrap().pop_front().unwrap()
        }

        async fn fetch_tracking(&self, _order_id: &OrderId) -> Result<TrackingResponse, ApiError> {
            self.tracking_calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.started.notify_one();
                self.release.notified().await;
            }
            self.tracking.lock().unwrap().pop_front().unwrap()
        }
    }

    fn refreshed(awb: &str, status: OrderStatus) -> TrackingResponse {
        let mut order = order(Some(awb));
        order.status = status;
        order.carrier_status = Some("In Transit".to_string());
        TrackingResponse { order: Some(order), error: None }
    }

    fn error_only(message: &str) -> TrackingResponse {
        TrackingResponse { order: None, error: Some(message.to_string()) }
    }

    fn applied(outcome: RefreshOutcome) -> TrackingView {
        match outcome {
            RefreshOutcome::Applied(view) => view,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_returned_order_replaces_view() {
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![Ok(refreshed(
            "AWB123",
            OrderStatus::Delivered,
        ))]));

        let view = applied(tracker.open(order(Some("PENDING"))).await);

        assert_eq!(view.order().carrier_awb.as_deref(), Some("AWB123"));
        assert_eq!(view.order().carrier_status.as_deref(), Some("In Transit"));
        assert_eq!(view.panel(), TrackingPanel::TrackingAvailable { awb: "AWB123".to_string() });
        assert!(view.is_terminal());
    }

    #[tokio::test]
    async fn test_error_only_keeps_order_and_suppresses_without_awb() {
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![Ok(error_only(
            "AWB not assigned yet",
        ))]));
        let original = order(Some("PENDING"));

        let view = applied(tracker.open(original.clone()).await);

        assert_eq!(view.order(), &original);
        assert_eq!(view.visible_error(), None);
        assert_eq!(view.panel(), TrackingPanel::NoTrackingYet);
    }

    #[tokio::test]
    async fn test_error_only_with_awb_is_stale() {
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![Ok(error_only(
            "Carrier timeout",
        ))]));
        let original = order(Some("AWB123"));

        let view = applied(tracker.open(original.clone()).await);

        assert_eq!(view.order(), &original);
        assert_eq!(view.visible_error(), Some("Carrier timeout"));
        assert!(matches!(view.panel(), TrackingPanel::TrackingStale { .. }));
    }

    #[tokio::test]
    async fn test_response_for_other_order_is_ignored() {
        let mut other = order(Some("AWB999"));
        other.id = OrderId::new("ORD-2002");
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![Ok(TrackingResponse {
            order: Some(other),
            error: None,
        })]));
        let original = order(Some("PENDING"));

        let view = applied(tracker.open(original.clone()).await);

        assert_eq!(view.order(), &original);
        assert_eq!(view.panel(), TrackingPanel::NoTrackingYet);
        assert_eq!(tracker.view().unwrap().order().id, original.id);
    }

    #[tokio::test]
    async fn test_server_failure_keeps_order() {
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![
            Err(ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "")),
            Ok(refreshed("AWB123", OrderStatus::Shipped)),
        ]));
        let original = order(Some("AWB123"));

        let view = applied(tracker.open(original.clone()).await);
        assert_eq!(view.order(), &original);
        assert!(view.visible_error().unwrap().contains("try again"));

        let view = applied(tracker.refresh(&original.id).await);
        assert_eq!(view.visible_error(), None);
        assert!(matches!(view.panel(), TrackingPanel::TrackingAvailable { .. }));
    }

    #[tokio::test]
    async fn test_session_expired_is_not_a_tracking_error() {
        let tracker = OrderTracker::new(FakeSource::with_tracking(vec![Err(ApiError::SessionExpired)]));
        let original = order(Some("AWB123"));

        assert_eq!(tracker.open(original.clone()).await, RefreshOutcome::SessionExpired);
        let view = tracker.view().unwrap();
        assert_eq!(view.order(), &original);
        assert_eq!(view.visible_error(), None);
    }

    #[tokio::test]
    async fn test_no_carrier_reference_skips_fetch() {
        let source = FakeSource::default();
        let tracker = OrderTracker::new(source);
        let mut unshipped = order(None);
        unshipped.carrier_shipment_id = None;

        assert_eq!(tracker.open(unshipped).await, RefreshOutcome::NotShipped);
        assert_eq!(tracker.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_of_other_order_is_not_open() {
        let tracker = OrderTracker::new(FakeSource::default());
        assert_eq!(
            tracker.refresh(&OrderId::new("ORD-1001")).await,
            RefreshOutcome::NotOpen
        );
    }

    #[tokio::test]
    async fn test_load_fetches_then_refreshes() {
        let source = FakeSource::with_tracking(vec![Ok(refreshed("AWB9", OrderStatus::Shipped))]);
        source.orders.lock().unwrap().push_back(Ok(order(Some("PENDING"))));
        let tracker = OrderTracker::new(source);

        let view = applied(tracker.load(&OrderId::new("ORD-1001")).await.unwrap());
        assert_eq!(view.order().awb(), Some("AWB9"));
    }

    #[tokio::test]
    async fn test_load_propagates_order_failure() {
        let source = FakeSource::default();
        source
            .orders
            .lock()
            .unwrap()
            .push_back(Err(ApiError::from_status(StatusCode::NOT_FOUND, "")));
        let tracker = OrderTracker::new(source);

        let err = tracker.load(&OrderId::new("ORD-404")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Rejected);
        assert!(tracker.view().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refresh_is_coalesced() {
        let source = FakeSource {
            gated: true,
            ..FakeSource::with_tracking(vec![Ok(refreshed("AWB123", OrderStatus::Shipped))])
        };
        let tracker = Arc::new(OrderTracker::new(source));
        let original = order(Some("AWB123"));
        let order_id = original.id.clone();

        let first = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.open(original).await }
        });
        tracker.source.started.notified().await;

        assert_eq!(tracker.refresh(&order_id).await, RefreshOutcome::InFlight);

        tracker.source.release.notify_one();
        assert!(matches!(first.await.unwrap(), RefreshOutcome::Applied(_)));
        assert_eq!(tracker.source.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_response_after_close_is_dropped() {
        let source = FakeSource {
            gated: true,
            ..FakeSource::with_tracking(vec![Ok(refreshed("AWB123", OrderStatus::Delivered))])
        };
        let tracker = Arc::new(OrderTracker::new(source));

        let pending = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.open(order(Some("AWB123"))).await }
        });
        tracker.source.started.notified().await;

        tracker.close();
        tracker.source.release.notify_one();

        assert_eq!(pending.await.unwrap(), RefreshOutcome::Stale);
        assert!(tracker.view().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_response_for_replaced_view_is_dropped() {
        let source = FakeSource {
            gated: true,
            ..FakeSource::with_tracking(vec![Ok(refreshed("AWB-OLD", OrderStatus::Delivered))])
        };
        let tracker = Arc::new(OrderTracker::new(source));

        let pending = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.open(order(Some("AWB123"))).await }
        });
        tracker.source.started.notified().await;

        let mut other = order(None);
        other.id = OrderId::new("ORD-2002");
        other.carrier_shipment_id = None;
        assert_eq!(tracker.open(other).await, RefreshOutcome::NotShipped);

        tracker.source.release.notify_one();
        assert_eq!(pending.await.unwrap(), RefreshOutcome::Stale);
        assert_eq!(tracker.view().unwrap().order().id.as_str(), "ORD-2002");
    }
}
