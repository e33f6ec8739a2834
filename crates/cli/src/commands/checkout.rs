//! Checkout command.
//!
//! # Usage
//!
//! ```bash
//! dw checkout --full-name "Ananya Rao" --phone 9876543210 \
//!     --address-line1 "12 MG Road" --city Bengaluru --state Karnataka --pincode 560001
//! ```

use clap::Args;
use dreamweave_storefront::api::{CheckoutRequest, ShippingAddress};
use dreamweave_storefront::error::{AppError, Result};
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;

use crate::output;

/// Delivery details and payment method.
#[derive(Args)]
pub struct CheckoutArgs {
    /// Recipient name
    #[arg(long)]
    full_name: String,

    /// Recipient phone number
    #[arg(long)]
    phone: String,

    /// Street address
    #[arg(long)]
    address_line1: String,

    /// Apartment, suite, landmark
    #[arg(long)]
    address_line2: Option<String>,

    /// City
    #[arg(long)]
    city: String,

    /// State
    #[arg(long)]
    state: String,

    /// Postal code
    #[arg(long)]
    pincode: String,

    /// Country
    #[arg(long)]
    country: Option<String>,

    /// Payment method
    #[arg(long, default_value = "cod")]
    payment_method: String,
}

impl CheckoutArgs {
    fn into_parts(self) -> (ShippingAddress, String) {
        (
            ShippingAddress {
                full_name: self.full_name,
                phone: self.phone,
                address_line1: self.address_line1,
                address_line2: self.address_line2,
                city: self.city,
                state: self.state,
                pincode: self.pincode,
                country: self.country,
            },
            self.payment_method,
        )
    }
}

pub async fn run<S: Storage>(state: &AppState<S>, args: CheckoutArgs) -> Result<()> {
    if !state.session().is_logged_in().await {
        return Err(AppError::NotSignedIn);
    }

    let cart = state.store().cart().await;
    if cart.is_empty() {
        return Err(AppError::Validation("Your cart is empty".to_string()));
    }

    let (address, payment_method) = args.into_parts();
    let request = CheckoutRequest::from_cart(&cart, address, payment_method);
    let order = state.client().create_order(&request).await?;

    // The order exists now; a failure to clear the cart is reported, not returned.
    if let Err(e) = state.store().clear_cart().await {
        AppError::from(e).report();
    }

    output::done(&format!("Order {} placed. Track it with `dw orders track {}`.", order.id, order.id));
    Ok(())
}
