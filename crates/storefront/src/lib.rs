//! Suq storefront library.
//!
//! The shopping session engine (cart, navigation, checkout and scanning)
//! plus the catalog/checkout clients and the mock API router, exposed as a
//! library so it can be tested and embedded by a presentation layer.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod navigation;
pub mod routes;
pub mod scan;
pub mod session;
pub mod state;

pub use session::{Notice, NoticeKind, Session};
