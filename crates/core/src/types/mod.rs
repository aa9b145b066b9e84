//! Core types for Suq.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod id;
pub mod price;
pub mod status;

pub use catalog::{Category, Product, Shop};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use status::*;
