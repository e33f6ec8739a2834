//! Wire types for the commerce API.
//!
//! These mirror the JSON the API returns (camelCase). Orders are read-only
//! projections of server state: the client receives and re-fetches them but
//! never builds one itself.

use std::fmt;

use chrono::{DateTime, Utc};
use dreamweave_core::{Email, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{Cart, CartLine};

/// Placeholder the carrier integration stores before an AWB is issued.
const PENDING_AWB: &str = "pending";

/// Whether `awb` is a real carrier-issued tracking number.
///
/// Empty, whitespace-only, and the `"pending"` placeholder (any case) all
/// mean "not yet assigned".
#[must_use]
pub fn is_assigned_awb(awb: &str) -> bool {
    let trimmed = awb.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(PENDING_AWB)
}

// =============================================================================
// Orders
// =============================================================================

/// An order as reported by the commerce API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub carrier_order_id: Option<String>,
    #[serde(default)]
    pub carrier_shipment_id: Option<String>,
    #[serde(default)]
    pub carrier_awb: Option<String>,
    #[serde(default)]
    pub carrier_tracking_url: Option<String>,
    #[serde(default)]
    pub carrier_status: Option<String>,
    #[serde(default)]
    pub tracking_events: Vec<TrackingEvent>,
}

impl Order {
    /// Whether the carrier has issued a real AWB for this order.
    #[must_use]
    pub fn has_awb(&self) -> bool {
        self.carrier_awb.as_deref().is_some_and(is_assigned_awb)
    }

    /// The AWB, if one has been issued.
    #[must_use]
    pub fn awb(&self) -> Option<&str> {
        self.carrier_awb
            .as_deref()
            .filter(|awb| is_assigned_awb(awb))
            .map(str::trim)
    }

    /// Whether the order carries any carrier reference worth asking the
    /// tracking endpoint about. A placeholder AWB still counts: the
    /// shipment exists even though its number has not been issued.
    #[must_use]
    pub fn has_carrier_reference(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.carrier_awb) || present(&self.carrier_shipment_id)
    }

    /// Total number of units across all items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(alias = "product")]
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Delivery address on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.full_name, self.address_line1)?;
        if let Some(line2) = self.address_line2.as_deref().filter(|l| !l.is_empty()) {
            write!(f, ", {line2}")?;
        }
        write!(f, ", {}, {} {}", self.city, self.state, self.pincode)
    }
}

/// One carrier scan event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    #[serde(alias = "status")]
    pub activity: String,
    /// Carrier-formatted timestamp, kept verbatim.
    #[serde(alias = "date")]
    pub timestamp: String,
    #[serde(default)]
    pub location: Option<String>,
}

// =============================================================================
// Response envelopes
// =============================================================================

/// `GET /orders/user/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct OrdersEnvelope {
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// `GET /orders/{id}` and `POST /orders`.
#[derive(Debug, Deserialize)]
pub(crate) struct OrderEnvelope {
    pub order: Order,
}

/// `GET /orders/{id}/tracking`: a best-effort overlay.
///
/// Both fields may be absent: the carrier had nothing new to say.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackingResponse {
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Error body shape used by the API (`{"message": ...}` or `{"error": ...}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Checkout
// =============================================================================

/// A cart line as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&CartLine> for CheckoutItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            price: line.unit_price.amount(),
            size: line.selected_size.clone(),
            color: line.selected_color.clone(),
            kind: line.selected_type.clone(),
            image: line.image.clone(),
        }
    }
}

/// `POST /orders` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
}

impl CheckoutRequest {
    /// Snapshot `cart` for submission.
    #[must_use]
    pub fn from_cart(cart: &Cart, shipping_address: ShippingAddress, payment_method: impl Into<String>) -> Self {
        Self {
            items: cart.lines().iter().map(CheckoutItem::from).collect(),
            total: cart.total_price(),
            shipping_address,
            payment_method: payment_method.into(),
        }
    }
}

// =============================================================================
// Contact
// =============================================================================

/// Contact form as entered by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

/// `POST /contact` body.
#[derive(Debug, Serialize)]
pub(crate) struct ContactSubmission<'a> {
    pub name: &'a str,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<&'a str>,
    pub message: &'a str,
    pub source: &'a str,
}

// =============================================================================
// Auth
// =============================================================================

/// The signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// `POST /auth/login` body.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /auth/login` response.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A shipped order as the API returns it.
    pub(crate) fn order_json(awb: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "_id": "ORD-1001",
            "status": "shipped",
            "items": [{
                "productId": "P1",
                "name": "Egyptian Cotton Sheet Set",
                "quantity": 2,
                "price": 799,
                "size": "king",
                "color": "ivory",
                "type": "fitted"
            }],
            "total": 1598,
            "paymentMethod": "razorpay",
            "paymentStatus": "paid",
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
            "trackingEvents": [
                {"status": "Picked up", "date": "2024-05-02 09:00", "location": "Bengaluru Hub"}
            ]
        })
    }

    pub(crate) fn order(awb: Option<&str>) -> Order {
        serde_json::from_value(order_json(awb)).unwrap()
    }

    #[test]
    fn test_awb_sentinels() {
        assert!(!is_assigned_awb(""));
        assert!(!is_assigned_awb("   "));
        assert!(!is_assigned_awb("PENDING"));
        assert!(!is_assigned_awb(" Pending "));
        assert!(is_assigned_awb("1234567890"));
        assert!(is_assigned_awb("pending-123"));
    }

    #[test]
    fn test_order_deserializes_wire_format() {
        let order = order(Some("AWB123"));
        assert_eq!(order.id.as_str(), "ORD-1001");
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.items[0].kind.as_deref(), Some("fitted"));
        assert_eq!(order.total, Decimal::from(1598));
        assert_eq!(order.tracking_events[0].activity, "Picked up");
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn test_has_awb() {
        assert!(order(Some("AWB123")).has_awb());
        assert_eq!(order(Some(" AWB123 ")).awb(), Some("AWB123"));
        assert!(!order(Some("pending")).has_awb());
        assert!(!order(Some("")).has_awb());
        assert!(!order(None).has_awb());
    }

    #[test]
    fn test_carrier_reference() {
        assert!(order(Some("PENDING")).has_carrier_reference());

        let mut bare = order(None);
        assert!(bare.has_carrier_reference());
        bare.carrier_shipment_id = Some(String::new());
        assert!(!bare.has_carrier_reference());
    }

    #[test]
    fn test_tracking_response_shapes() {
        let empty: TrackingResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, TrackingResponse::default());

        let error: TrackingResponse =
            serde_json::from_str(r#"{"error":"AWB not assigned yet"}"#).unwrap();
        assert!(error.order.is_none());
        assert_eq!(error.error.as_deref(), Some("AWB not assigned yet"));
    }

    #[test]
    fn test_shipping_address_display() {
        let order = order(None);
        assert_eq!(
            order.shipping_address.to_string(),
            "Ananya Rao, 12 MG Road, Bengaluru, Karnataka 560001"
        );
    }

    #[test]
    fn test_auth_response_debug_redacts_token() {
        let auth: AuthResponse = serde_json::from_value(serde_json::json!({
            "token": "super_secret_jwt",
            "user": {"_id": "U1", "name": "Ananya", "email": "ananya@example.com"}
        }))
        .unwrap();
        let debug = format!("{auth:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_secret_jwt"));
    }
}
