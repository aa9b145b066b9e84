//! Suq Core - Shared types library.
//!
//! This crate provides the types shared by the storefront session engine and
//! the mock catalog/checkout API:
//! - entity identifiers for products, shops, categories and checkouts
//! - decimal prices with a currency code
//! - immutable catalog reference data
//! - payment and scan status enums exposed to the presentation layer
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no timers, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs and prices, catalog entities, statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
