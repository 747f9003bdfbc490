//! Cart error types.
//!
//! Only failures the caller can act on are returned. Persistence writes are
//! fire-and-forget: a failed write is logged by the background writer and
//! counted on the store, never returned from a mutation.

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::store::LoadStatus;

/// Why the initial load of the stored cart failed.
#[derive(Debug, Error)]
pub enum StorageReadFailure {
    /// The backend could not return the payload.
    #[error("could not read stored cart: {0}")]
    Storage(#[from] StorageError),

    /// A payload exists but is not a valid cart.
    #[error("stored cart is malformed: {0}")]
    Malformed(#[from] CodecError),
}

/// Errors returned by the cart store and its consumer scope.
#[derive(Debug, Error)]
pub enum CartError {
    /// The consumer API was used with no cart store in scope.
    #[error("cart accessed outside of a cart scope")]
    OutOfScope,

    /// A mutation was attempted before the initial load finished.
    #[error("cart is not ready (status: {0})")]
    NotReady(LoadStatus),

    /// `load` was called on a store that has already started loading.
    #[error("cart cannot be loaded from status {0}")]
    InvalidState(LoadStatus),

    /// The initial load from durable storage failed.
    #[error(transparent)]
    StorageRead(#[from] StorageReadFailure),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<StorageError> for CartError {
    fn from(err: StorageError) -> Self {
        Self::StorageRead(err.into())
    }
}

impl From<CodecError> for CartError {
    fn from(err: CodecError) -> Self {
        Self::StorageRead(err.into())
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
