//! Terminal rendering for command results.

use dreamweave_core::{ProductId, format_rupees};
use dreamweave_storefront::api::{Order, TrackingEvent};
use dreamweave_storefront::error::{AppError, ErrorKind};
use dreamweave_storefront::store::{Cart, CartLine, Wishlist};
use dreamweave_storefront::tracking::{TrackingPanel, TrackingView};

/// Print a one-line confirmation.
#[allow(clippy::print_stdout)]
pub fn done(message: &str) {
    println!("{message}");
}

/// Print an error and what to do about it.
#[allow(clippy::print_stderr)]
pub fn failure(err: &AppError) {
    let hint = match err.kind() {
        ErrorKind::SessionExpired => " Run `dw login` to sign in.",
        ErrorKind::Retryable => " Run the command again to retry.",
        ErrorKind::Validation | ErrorKind::Rejected => "",
    };
    eprintln!("error: {}{hint}", err.user_message());
}

fn variant(line: &CartLine) -> String {
    [&line.selected_size, &line.selected_color, &line.selected_type]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" / ")
}

#[allow(clippy::print_stdout)]
pub fn cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in cart.lines() {
        let variant = variant(line);
        println!(
            "{:<10} {}{}  {} x {} = {}",
            line.product_id,
            line.name,
            if variant.is_empty() { String::new() } else { format!(" ({variant})") },
            line.quantity,
            line.unit_price,
            line.line_total().map_or_else(|| "-".to_string(), format_rupees),
        );
    }
    println!();
    println!(
        "Items: {}   Total: {}",
        cart.total_items(),
        format_rupees(cart.total_price())
    );
}

#[allow(clippy::print_stdout)]
pub fn wishlist(wishlist: &Wishlist) {
    if wishlist.is_empty() {
        println!("Your wishlist is empty.");
        return;
    }
    for id in wishlist.items() {
        println!("{id}");
    }
}

#[allow(clippy::print_stdout)]
pub fn wishlist_toggled(id: &ProductId, saved: bool) {
    if saved {
        println!("Saved {id} to your wishlist.");
    } else {
        println!("Removed {id} from your wishlist.");
    }
}

#[allow(clippy::print_stdout)]
pub fn order_summaries(orders: &[Order]) {
    if orders.is_empty() {
        println!("No orders yet.");
        return;
    }
    for order in orders {
        println!(
            "{:<12} {}  {:<10} {} item(s)  {}",
            order.id,
            order.created_at.format("%Y-%m-%d"),
            order.status,
            order.item_count(),
            format_rupees(order.total),
        );
    }
}

#[allow(clippy::print_stdout)]
pub fn order(order: &Order) {
    println!("Order {}", order.id);
    println!("Placed:   {}", order.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("Status:   {}", order.status);
    println!("Payment:  {} ({})", order.payment_method, order.payment_status);
    println!("Ship to:  {}", order.shipping_address);
    println!();
    for item in &order.items {
        println!(
            "  {} x {}  {}",
            item.quantity,
            item.name,
            format_rupees(item.price * rust_decimal::Decimal::from(item.quantity)),
        );
    }
    println!("  Total: {}", format_rupees(order.total));
}

#[allow(clippy::print_stdout)]
pub fn tracking(view: &TrackingView) {
    order(view.order());
    println!();
    match view.panel() {
        TrackingPanel::NoTrackingYet => {
            println!("Tracking: not available yet. We'll share it once your order ships.");
        }
        TrackingPanel::TrackingAvailable { awb } => {
            println!("Tracking: AWB {awb}");
        }
        TrackingPanel::TrackingStale { awb, error } => {
            println!("Tracking: AWB {awb} (could not refresh: {error})");
        }
    }
    if let Some(status) = view.order().carrier_status.as_deref() {
        println!("Carrier:  {status}");
    }
    if let Some(url) = view.order().carrier_tracking_url.as_deref() {
        println!("Track at: {url}");
    }
    for event in &view.order().tracking_events {
        tracking_event(event);
    }
    if view.is_terminal() {
        println!("This order is {}.", view.order().status);
    }
}

#[allow(clippy::print_stdout)]
fn tracking_event(event: &TrackingEvent) {
    match event.location.as_deref() {
        Some(location) => println!("  {}  {} ({location})", event.timestamp, event.activity),
        None => println!("  {}  {}", event.timestamp, event.activity),
    }
}
