//! Core types for GoMarket.
//!
//! This module provides type-safe wrappers for the cart's domain concepts.

pub mod id;
pub mod price;
pub mod product;

pub use id::ProductId;
pub use price::Price;
pub use product::{CartEntry, Product};
