//! Integration tests for the order tracker over HTTP.

#![allow(clippy::unwrap_used)]

use axum::http::Method;
use dreamweave_core::OrderId;
use dreamweave_integration_tests::{FakeApi, order_json};
use dreamweave_storefront::api::{ApiClient, FailureKind};
use dreamweave_storefront::tracking::{OrderTracker, RefreshOutcome, TrackingPanel};
use serde_json::json;

fn tracker(api: &FakeApi) -> OrderTracker<ApiClient> {
    OrderTracker::new(ApiClient::new(&api.api_config()).expect("client"))
}

#[tokio::test]
async fn test_pending_awb_becomes_trackable() {
    let api = FakeApi::start().await;
    api.respond(Method::GET, "orders/ORD-1", 200, &json!({ "order": order_json("ORD-1", Some("PENDING")) }));
    let mut refreshed = order_json("ORD-1", Some("AWB123"));
    refreshed["carrierStatus"] = json!("In Transit");
    refreshed["trackingEvents"] = json!([
        { "status": "Picked up", "date": "2024-05-02 09:00", "location": "Bengaluru Hub" },
        { "activity": "In transit", "timestamp": "2024-05-03 18:30" }
    ]);
    api.respond(Method::GET, "orders/ORD-1/tracking", 200, &json!({ "order": refreshed }));

    let tracker = tracker(&api);
    let outcome = tracker.load(&OrderId::new("ORD-1")).await.expect("load");

    let RefreshOutcome::Applied(view) = outcome else {
        panic!("expected Applied, got {outcome:?}");
    };
    assert_eq!(view.panel(), TrackingPanel::TrackingAvailable { awb: "AWB123".to_string() });
    assert_eq!(view.order().tracking_events.len(), 2);
    assert_eq!(view.order().tracking_events[1].activity, "In transit");
    assert_eq!(
        api.requests().iter().map(|r| r.path.as_str()).collect::<Vec<_>>(),
        vec!["/api/orders/ORD-1", "/api/orders/ORD-1/tracking"]
    );
}

#[tokio::test]
async fn test_no_awb_error_is_suppressed() {
    let api = FakeApi::start().await;
    let original = order_json("ORD-1", Some("pending"));
    api.respond(Method::GET, "orders/ORD-1", 200, &json!({ "order": original }));
    api.respond(
        Method::GET,
        "orders/ORD-1/tracking",
        404,
        &json!({ "error": "AWB not assigned yet" }),
    );

    let tracker = tracker(&api);
    let outcome = tracker.load(&OrderId::new("ORD-1")).await.expect("load");

    let RefreshOutcome::Applied(view) = outcome else {
        panic!("expected Applied, got {outcome:?}");
    };
    assert_eq!(view.panel(), TrackingPanel::NoTrackingYet);
    assert_eq!(view.visible_error(), None);
    assert_eq!(view.order().carrier_awb.as_deref(), Some("pending"));
}

#[tokio::test]
async fn test_server_failure_keeps_last_known_order() {
    let api = FakeApi::start().await;
    api.respond(Method::GET, "orders/ORD-1", 200, &json!({ "order": order_json("ORD-1", Some("AWB123")) }));
    api.respond_raw(Method::GET, "orders/ORD-1/tracking", 502, "");

    let tracker = tracker(&api);
    let outcome = tracker.load(&OrderId::new("ORD-1")).await.expect("load");

    let RefreshOutcome::Applied(view) = outcome else {
        panic!("expected Applied, got {outcome:?}");
    };
    assert!(matches!(view.panel(), TrackingPanel::TrackingStale { .. }));
    assert_eq!(view.order().awb(), Some("AWB123"));
}

#[tokio::test]
async fn test_expired_session_during_tracking() {
    let api = FakeApi::start().await;
    api.respond(Method::GET, "orders/ORD-1", 200, &json!({ "order": order_json("ORD-1", Some("AWB123")) }));
    api.respond(Method::GET, "orders/ORD-1/tracking", 401, &json!({ "message": "jwt expired" }));

    let tracker = tracker(&api);
    let outcome = tracker.load(&OrderId::new("ORD-1")).await.expect("load");

    assert_eq!(outcome, RefreshOutcome::SessionExpired);
    assert_eq!(tracker.view().unwrap().visible_error(), None);
}

#[tokio::test]
async fn test_missing_order_fails_load() {
    let api = FakeApi::start().await;

    let err = tracker(&api).load(&OrderId::new("ORD-404")).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Rejected);
}
