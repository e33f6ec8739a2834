//! Wishlist commands.

use clap::Subcommand;
use dreamweave_core::ProductId;
use dreamweave_storefront::error::Result;
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;

use crate::output;

#[derive(Subcommand)]
pub enum WishlistAction {
    /// Show saved products
    Show,
    /// Save a product, or unsave it if already saved
    Toggle {
        /// Product ID
        product_id: String,
    },
    /// Remove every saved product
    Clear,
}

pub async fn run<S: Storage>(state: &AppState<S>, action: WishlistAction) -> Result<()> {
    let store = state.store();

    match action {
        WishlistAction::Show => output::wishlist(&store.wishlist().await),
        WishlistAction::Toggle { product_id } => {
            let id = ProductId::new(product_id);
            let saved = store.toggle_wishlist(&id).await?;
            output::wishlist_toggled(&id, saved);
        }
        WishlistAction::Clear => {
            store.clear_wishlist().await?;
            output::done("Wishlist cleared.");
        }
    }
    Ok(())
}
