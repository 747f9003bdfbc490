//! Durable key-value storage used to mirror the cart.
//!
//! The cart only needs two calls: read a payload by key and overwrite it.
//! [`KeyValueStore`] is that seam; [`MemoryStore`] and [`FileStore`] are the
//! adapters shipped with the crate.

mod file;
mod memory;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem or OS-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous get/set-by-key storage.
///
/// Implementations must be shareable across tasks; the cart reads through
/// the handle on startup and a background writer calls [`set`](Self::set)
/// after every change.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Fetch the value stored under `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Boxed future returned by [`DynKeyValueStore`].
pub(crate) type StorageFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Object-safe view of a [`KeyValueStore`].
///
/// Lets the cart store hold any backend behind one `Arc` without carrying a
/// type parameter.
pub(crate) trait DynKeyValueStore: Send + Sync + 'static {
    fn get_boxed<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>>;

    fn set_boxed<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()>;
}

impl<S: KeyValueStore> DynKeyValueStore for S {
    fn get_boxed<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(self.get(key))
    }

    fn set_boxed<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(self.set(key, value))
    }
}
