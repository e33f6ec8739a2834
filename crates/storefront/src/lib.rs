//! Dreamweave storefront client library.
//!
//! Client-side commerce core: the cart and wishlist store with durable
//! persistence and change notification, the commerce API client, the order
//! tracking reconciler, and the customer session. Front ends (the `dw` CLI,
//! views) compose these through [`state::AppState`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod tracking;
