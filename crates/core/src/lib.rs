//! Dreamweave Core - Shared types library.
//!
//! This crate provides common types used across all Dreamweave components:
//! - `storefront` - Client-side commerce state (cart, wishlist, orders, tracking)
//! - `cli` - Command-line shell over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
