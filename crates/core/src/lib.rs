//! GoMarket Core - Shared types library.
//!
//! This crate provides the domain types shared by the cart components:
//! - `gomarket-cart` - Cart state, persistence, and the consumer-facing store
//! - `gomarket-integration-tests` - Cross-crate tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no async
//! runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs, prices, and cart entries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
