//! HTTP client for the commerce API.

use std::sync::Arc;

use dreamweave_core::{Email, OrderId, UserId};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::types::{
    AuthResponse, CheckoutRequest, ContactForm, ContactSubmission, LoginRequest, Order,
    OrderEnvelope, OrdersEnvelope, TrackingResponse,
};
use super::{ApiError, error_message};
use crate::config::ApiConfig;

/// Header carrying the per-request correlation ID.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest slice of a response body written to logs.
const MAX_LOGGED_BODY_CHARS: usize = 500;

/// Client for the commerce API.
///
/// Cheaply cloneable; clones share the connection pool and the bearer
/// token, so a token set through one clone applies to all of them.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    contact_source: String,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("dreamweave-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: directory_url(config.base_url.clone()),
                contact_source: config.contact_source.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    /// The base URL endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Credential
    // =========================================================================

    /// Attach `token` to every request started from now on.
    pub async fn set_token(&self, token: SecretString) {
        *self.inner.token.write().await = Some(token);
        debug!("Bearer token set");
    }

    /// Stop attaching a bearer token. Idempotent.
    pub async fn remove_token(&self) {
        if self.inner.token.write().await.take().is_some() {
            debug!("Bearer token removed");
        }
    }

    /// Whether a bearer token is currently set.
    pub async fn has_token(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Get all orders placed by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the session has expired.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_orders(&self, user_id: &UserId) -> Result<Vec<Order>, ApiError> {
        let path = format!("orders/user/{}", segment(user_id.as_str()));
        let envelope: OrdersEnvelope = self.send(self.request(Method::GET, &path).await?).await?;
        debug!(count = envelope.orders.len(), "Fetched orders");
        Ok(envelope.orders)
    }

    /// Get a single order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the order does not exist, or
    /// the session has expired.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("orders/{}", segment(order_id.as_str()));
        let envelope: OrderEnvelope = self.send(self.request(Method::GET, &path).await?).await?;
        Ok(envelope.order)
    }

    /// Ask the carrier for the latest state of an order.
    ///
    /// A 4xx reply other than 401 is not an error here: its message is
    /// returned in [`TrackingResponse::error`] so the caller can keep showing
    /// the order it already has.
    ///
    /// # Errors
    ///
    /// Returns an error on 401, 5xx, transport failure, or a malformed body.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_tracking(&self, order_id: &OrderId) -> Result<TrackingResponse, ApiError> {
        let path = format!("orders/{}/tracking", segment(order_id.as_str()));
        let (status, body) = self.fetch(self.request(Method::GET, &path).await?).await?;

        if status.is_client_error() && status != StatusCode::UNAUTHORIZED {
            let error = error_message(status, &body);
            debug!(status = %status, error = %error, "Tracking unavailable");
            return Ok(TrackingResponse { order: None, error: Some(error) });
        }

        decode(status, &body)
    }

    /// Submit a checkout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for an empty checkout, otherwise an
    /// error if the request fails or the session has expired.
    #[instrument(skip(self, checkout), fields(items = checkout.items.len()))]
    pub async fn create_order(&self, checkout: &CheckoutRequest) -> Result<Order, ApiError> {
        if checkout.items.is_empty() {
            return Err(ApiError::Validation("Cart is empty".to_string()));
        }
        let builder = self.request(Method::POST, "orders").await?.json(checkout);
        let envelope: OrderEnvelope = self.send(builder).await?;
        tracing::info!(order_id = %envelope.order.id, "Order created");
        Ok(envelope.order)
    }

    // =========================================================================
    // Contact
    // =========================================================================

    /// Submit the contact form.
    ///
    /// The form is validated before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for a missing name or message or an
    /// invalid email, otherwise an error if the request fails.
    #[instrument(skip(self, form))]
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<(), ApiError> {
        let submission = self.contact_submission(form)?;
        let builder = self.request(Method::POST, "contact").await?.json(&submission);
        let (status, body) = self.fetch(builder).await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        tracing::info!("Contact form submitted");
        Ok(())
    }

    fn contact_submission<'a>(&'a self, form: &'a ContactForm) -> Result<ContactSubmission<'a>, ApiError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Name is required".to_string()));
        }
        let message = form.message.trim();
        if message.is_empty() {
            return Err(ApiError::Validation("Message is required".to_string()));
        }
        let email = Email::parse(&form.email).map_err(|e| ApiError::Validation(e.to_string()))?;
        let non_empty = |v: &'a Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty());

        Ok(ContactSubmission {
            name,
            email,
            phone: non_empty(&form.phone),
            subject: non_empty(&form.subject),
            message,
            source: &self.inner.contact_source,
        })
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange credentials for a token and profile.
    ///
    /// Does not set the token; the session owns that.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthResponse, ApiError> {
        let email = Email::parse(email).map_err(|e| ApiError::Validation(e.to_string()))?;
        if password.expose_secret().is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }
        let body = LoginRequest {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let builder = self.request(Method::POST, "auth/login").await?.json(&body);
        self.send(builder).await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Start a request to `path`, attaching the request ID and current token.
    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "Sending request");

        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.inner.token.read().await.as_ref() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        Ok(builder)
    }

    /// Send a request and read the whole body.
    async fn fetch(&self, builder: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %truncate(&body),
                "Commerce API returned non-success status"
            );
        }
        Ok((status, body))
    }

    /// Send a request and decode a 2xx JSON body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let (status, body) = self.fetch(builder).await?;
        decode(status, &body)
    }
}

/// Decode `body` for a completed response.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(ApiError::from_status(status, body));
    }
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %truncate(body),
            "Failed to parse commerce API response"
        );
        ApiError::Parse(e)
    })
}

/// Make `url` usable as a base for relative joins by ending its path with `/`.
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Percent-encode an ID for use as a single path segment.
fn segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_LOGGED_BODY_CHARS).collect()
}
