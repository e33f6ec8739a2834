//! Order history and tracking commands.
//!
//! # Usage
//!
//! ```bash
//! dw orders list
//! dw orders show ORD-1001
//! dw orders track ORD-1001
//! ```

use clap::Subcommand;
use dreamweave_core::OrderId;
use dreamweave_storefront::api::ApiError;
use dreamweave_storefront::error::{AppError, Result};
use dreamweave_storefront::state::AppState;
use dreamweave_storefront::storage::Storage;
use dreamweave_storefront::tracking::RefreshOutcome;

use crate::output;

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List your orders
    List,
    /// Show one order
    Show {
        /// Order ID
        order_id: String,
    },
    /// Show an order with the latest carrier tracking
    Track {
        /// Order ID
        order_id: String,
    },
}

pub async fn run<S: Storage>(state: &AppState<S>, action: OrdersAction) -> Result<()> {
    let user = state.session().current_user().await.ok_or(AppError::NotSignedIn)?;

    match action {
        OrdersAction::List => {
            let orders = state.client().get_orders(&user.id).await?;
            output::order_summaries(&orders);
        }
        OrdersAction::Show { order_id } => {
            let order = state.client().get_order(&OrderId::new(order_id)).await?;
            output::order(&order);
        }
        OrdersAction::Track { order_id } => track(state, &OrderId::new(order_id)).await?,
    }
    Ok(())
}

async fn track<S: Storage>(state: &AppState<S>, order_id: &OrderId) -> Result<()> {
    let tracker = state.tracker();
    let outcome = tracker.load(order_id).await;
    let view = tracker.view();
    tracker.close();

    match outcome? {
        RefreshOutcome::SessionExpired => Err(ApiError::SessionExpired.into()),
        RefreshOutcome::Applied(view) => {
            output::tracking(&view);
            Ok(())
        }
        other => {
            tracing::debug!(outcome = ?other, "Tracking not refreshed");
            match view {
                Some(view) => {
                    output::tracking(&view);
                    Ok(())
                }
                None => Err(AppError::Validation(format!("Order {order_id} could not be shown"))),
            }
        }
    }
}
