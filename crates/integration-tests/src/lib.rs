//! Integration tests for Dreamweave.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dreamweave-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `api_client` - Commerce API client against a fake server
//! - `order_tracking` - Tracker end-to-end over HTTP
//! - `persistence` - Store and session over on-disk storage
//!
//! # Fake API
//!
//! [`FakeApi`] is an `axum` server bound to an ephemeral local port. Tests
//! queue canned responses per method and path and inspect the requests it
//! recorded.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use dreamweave_storefront::config::ApiConfig;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// A request the fake server received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Canned {
    status: StatusCode,
    body: String,
}

#[derive(Default)]
struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<HashMap<(Method, String), VecDeque<Canned>>>,
}

/// Fake commerce API.
///
/// The server task is aborted on drop.
pub struct FakeApi {
    addr: SocketAddr,
    state: Arc<FakeState>,
    server: JoinHandle<()>,
}

impl FakeApi {
    /// Start the server on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let router = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake API listener");
        let addr = listener.local_addr().expect("fake API address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, state, server }
    }

    /// Base URL of the API, with an `/api` prefix like production.
    ///
    /// # Panics
    ///
    /// Panics if the address does not form a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api", self.addr)).expect("fake API URL")
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.base_url())
    }

    /// Queue a JSON response for `method` on `path` (relative to `/api`).
    /// Responses queued for the same route are served in order; the last one
    /// is repeated.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: &Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    /// Queue a raw response body.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code.
    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        let canned = Canned {
            status: StatusCode::from_u16(status).expect("valid status"),
            body: body.to_string(),
        };
        self.state
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, format!("/api/{}", path.trim_start_matches('/'))))
            .or_default()
            .push_back(canned);
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request.
    ///
    /// # Panics
    ///
    /// Panics if no request has been received.
    #[must_use]
    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("at least one request")
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A base URL with nothing listening behind it.
///
/// # Panics
///
/// Panics if a throwaway listener cannot be bound.
pub async fn unreachable_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind throwaway listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    Url::parse(&format!("http://{addr}/api")).expect("unreachable URL")
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let path = uri.path().to_string();

    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            authorization: header(header::AUTHORIZATION.as_str()),
            request_id: header("x-request-id"),
            body: serde_json::from_slice(&body).ok(),
        });

    let canned = {
        let mut responses = state.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses.get_mut(&(method, path)).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };

    let Canned { status, body } = canned.unwrap_or(Canned {
        status: StatusCode::NOT_FOUND,
        body: r#"{"message":"No such route"}"#.to_string(),
    });
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// A shipped order in the API's wire format.
#[must_use]
pub fn order_json(id: &str, awb: Option<&str>) -> Value {
    serde_json::json!({
        "_id": id,
        "status": "shipped",
        "items": [{
            "productId": "P1",
            "name": "Egyptian Cotton Sheet Set",
            "quantity": 3,
            "price": 799,
            "size": "king"
        }],
        "total": 2397,
        "paymentMethod": "cod",
        "paymentStatus": "pending",
        "shippingAddress": {
            "fullName": "Ananya Rao",
            "phone": "9876543210",
            "addressLine1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "pincode": "560001"
        },
        "createdAt": "2024-05-01T10:20:00Z",
        "carrierShipmentId": "SHP-77",
        "carrierAwb": awb,
        "trackingEvents": []
    })
}
