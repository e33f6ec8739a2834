//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! dw cart show
//! dw cart add P1 --name "Egyptian Cotton Sheet Set" --price 799 -q 2 --size king
//! dw cart set P1 3 --size king
//! dw cart set P1 0 --size king     # removes the line
//! dw cart remove P1 --size king
//! dw cart clear
//! ```

use clap::{Args, Subcommand};
use dreamweave_core::{Price, ProductId};
use dreamweave_storefront::error::{AppError, Result};
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;
use dreamweave_storefront::store::{AddOptions, LineKey, ProductSnapshot, StoreError};
use rust_decimal::Decimal;

use crate::output;

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart and its totals
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        product_id: String,

        /// Product display name
        #[arg(long)]
        name: String,

        /// Unit price in rupees
        #[arg(long)]
        price: Decimal,

        /// Product image URL
        #[arg(long)]
        image: Option<String>,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Set the quantity of a cart line (0 or less removes it)
    Set {
        /// Product ID
        product_id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Remove a cart line
    Remove {
        /// Product ID
        product_id: String,

        #[command(flatten)]
        variant: VariantArgs,
    },
    /// Empty the cart
    Clear,
}

/// Variant selection identifying a cart line.
#[derive(Args)]
pub struct VariantArgs {
    /// Selected size
    #[arg(long)]
    size: Option<String>,

    /// Selected color
    #[arg(long)]
    color: Option<String>,

    /// Selected type (e.g., fitted, flat)
    #[arg(long = "type")]
    kind: Option<String>,
}

impl VariantArgs {
    fn key(self, product_id: String) -> LineKey {
        LineKey {
            product_id: ProductId::new(product_id),
            size: self.size,
            color: self.color,
            kind: self.kind,
        }
    }
}

pub async fn run<S: Storage>(state: &AppState<S>, action: CartAction) -> Result<()> {
    let store = state.store();

    match action {
        CartAction::Show => {}
        CartAction::Add {
            product_id,
            name,
            price,
            image,
            quantity,
            variant,
        } => {
            let price = Price::new(price).map_err(StoreError::from)?;
            let product = ProductSnapshot {
                id: ProductId::new(product_id),
                name,
                price,
                image,
            };
            let options = AddOptions {
                quantity,
                size: variant.size,
                color: variant.color,
                kind: variant.kind,
            };
            store.add_to_cart(&product, options).await?;
        }
        CartAction::Set {
            product_id,
            quantity,
            variant,
        } => {
            let key = variant.key(product_id);
            if store.cart().await.line(&key).is_none() {
                return Err(AppError::Validation(format!("{key} is not in your cart")));
            }
            store.update_quantity(&key, quantity).await?;
        }
        CartAction::Remove {
            product_id,
            variant,
        } => {
            store.remove_from_cart(&variant.key(product_id)).await?;
        }
        CartAction::Clear => {
            store.clear_cart().await?;
        }
    }

    output::cart(&store.cart().await);
    Ok(())
}
