//! GoMarket Cart - Client-side shopping cart state.
//!
//! Tracks an ordered list of products with quantities, applies add,
//! increment, and decrement operations, and mirrors every change to a
//! key-value store so the cart survives restarts.
//!
//! # Architecture
//!
//! - [`Cart`] - Plain value holding the entries; all state transitions live here
//! - [`CartStore`] - Shared handle owning the authoritative cart, its readiness
//!   status, and the background persistence writer
//! - [`KeyValueStore`] - Storage seam, with [`MemoryStore`] and [`FileStore`] adapters
//! - [`scope`] - Task-scoped access for consumers that cannot hold a handle
//!
//! # Persistence
//!
//! Mutations update memory synchronously and queue the serialized cart for a
//! single writer task. Writes land in mutation order; a failed write is
//! logged and counted but never fails the mutation. Use
//! [`CartStore::flush`] to wait for durability.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod codec;
pub mod config;
pub mod error;
pub mod scope;
pub mod storage;
pub mod store;
mod writer;

pub use cart::{Cart, CartChange};
pub use codec::{CART_STORAGE_KEY, CodecError};
pub use config::{CartConfig, ConfigError};
pub use error::{CartError, Result, StorageReadFailure};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{CartStore, LoadStatus};
