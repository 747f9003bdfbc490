//! Task-scoped access to a cart store.
//!
//! UI code that cannot thread a [`CartStore`] handle through every call can
//! run inside [`scope`] and fetch the store with [`current`]. Asking for the
//! store outside a scope is a programming error and fails immediately with
//! [`CartError::OutOfScope`].
//!
//! The scope is a Tokio task-local: tasks spawned from inside a scope do not
//! inherit it. Pass them a cloned handle or wrap them in their own scope.

use std::future::Future;

use crate::error::{CartError, Result};
use crate::store::CartStore;

tokio::task_local! {
    static CURRENT_CART: CartStore;
}

/// Run `future` with `store` available through [`current`].
pub async fn scope<F: Future>(store: CartStore, future: F) -> F::Output {
    CURRENT_CART.scope(store, future).await
}

/// Run `f` synchronously with `store` available through [`current`].
pub fn sync_scope<R>(store: CartStore, f: impl FnOnce() -> R) -> R {
    CURRENT_CART.sync_scope(store, f)
}

/// The store of the enclosing scope.
///
/// # Errors
///
/// Returns `CartError::OutOfScope` when called outside [`scope`] or
/// [`sync_scope`].
pub fn current() -> Result<CartStore> {
    with_current(CartStore::clone)
}

/// Borrow the store of the enclosing scope for the duration of `f`.
///
/// # Errors
///
/// Returns `CartError::OutOfScope` when called outside a scope.
pub fn with_current<R>(f: impl FnOnce(&CartStore) -> R) -> Result<R> {
    CURRENT_CART
        .try_with(f)
        .map_err(|_| CartError::OutOfScope)
}
