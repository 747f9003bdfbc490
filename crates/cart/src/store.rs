//! The cart store: authoritative in-memory cart plus its durable mirror.
//!
//! # Lifecycle
//!
//! A store starts [`LoadStatus::Uninitialized`]. [`CartStore::load`] moves it
//! to `Loading`, reads the stored payload, and ends in `Ready` (or `Failed`
//! if the payload could not be read or parsed). Mutations are only accepted
//! once `Ready`; earlier calls fail with [`CartError::NotReady`] instead of
//! silently editing the empty pre-load cart.
//!
//! # Consistency
//!
//! Every mutation runs inside the cart channel's write lock: the new cart is
//! computed, published to subscribers, and queued for persistence before the
//! lock is released. Concurrent callers therefore see each other's effects in
//! call order, and the writer receives snapshots in that same order.
//!
//! # Example
//!
//! ```rust
//! use gomarket_cart::{CartConfig, CartStore, MemoryStore};
//! use gomarket_core::Product;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gomarket_cart::Result<()> {
//! let store = CartStore::open(MemoryStore::new(), &CartConfig::default()).await?;
//!
//! store.add_to_cart(Product::new("p1", "Apple", "apple.png", "1.5".parse().unwrap()))?;
//! store.increment("p1")?;
//! assert_eq!(store.snapshot().get("p1").map(|e| e.quantity()), Some(2));
//!
//! store.flush().await;
//! # Ok(())
//! # }
//! ```

use core::fmt;
use std::sync::Arc;

use gomarket_core::Product;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::cart::{Cart, CartChange};
use crate::codec::{self, CART_STORAGE_KEY};
use crate::config::CartConfig;
use crate::error::{CartError, Result, StorageReadFailure};
use crate::storage::{DynKeyValueStore, FileStore, KeyValueStore};
use crate::writer::PersistQueue;

/// Where a store is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStatus {
    /// Created, `load` not called yet.
    #[default]
    Uninitialized,
    /// Reading the stored cart.
    Loading,
    /// Stored cart applied; mutations accepted.
    Ready,
    /// The stored cart could not be read or parsed.
    Failed,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Shared handle to one cart.
///
/// Cheap to clone; all clones see and mutate the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn DynKeyValueStore>,
    cart: watch::Sender<Cart>,
    status: watch::Sender<LoadStatus>,
    queue: PersistQueue,
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartStore")
            .field("status", &self.status())
            .field("entries", &self.inner.cart.borrow().len())
            .field("queue", &self.inner.queue)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an unloaded store over `storage`.
    ///
    /// Spawns the background writer, so this must be called from within a
    /// Tokio runtime. Call [`load`](Self::load) before mutating.
    pub fn new<S: KeyValueStore>(storage: S, config: &CartConfig) -> Self {
        let storage: Arc<dyn DynKeyValueStore> = Arc::new(storage);
        let queue =
            PersistQueue::spawn(Arc::clone(&storage), CART_STORAGE_KEY, config.coalesce_writes);
        let (cart, _) = watch::channel(Cart::new());
        let (status, _) = watch::channel(LoadStatus::Uninitialized);

        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                cart,
                status,
                queue,
            }),
        }
    }

    /// Create a store and load the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StorageRead` if the stored cart cannot be read or
    /// is malformed.
    pub async fn open<S: KeyValueStore>(storage: S, config: &CartConfig) -> Result<Self> {
        let store = Self::new(storage, config);
        store.load().await?;
        Ok(store)
    }

    /// Open a file-backed store configured from the environment.
    ///
    /// # Errors
    ///
    /// - `CartError::Config` if an environment variable is invalid.
    /// - `CartError::StorageRead` if the stored cart cannot be read or is
    ///   malformed.
    pub async fn open_from_env() -> Result<Self> {
        let config = CartConfig::from_env()?;
        Self::open(FileStore::from_config(&config), &config).await
    }

    /// Load the stored cart and mark the store ready.
    ///
    /// A missing payload yields an empty cart. A payload that is present but
    /// unreadable fails the load and leaves the store `Failed`; it is never
    /// replaced by an empty cart.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidState` if `load` was already called.
    /// - `CartError::StorageRead` if the read fails or the payload is malformed.
    #[instrument(skip(self), fields(key = CART_STORAGE_KEY))]
    pub async fn load(&self) -> Result<()> {
        let mut started = false;
        self.inner.status.send_if_modified(|status| {
            if *status == LoadStatus::Uninitialized {
                *status = LoadStatus::Loading;
                started = true;
            }
            started
        });
        if !started {
            return Err(CartError::InvalidState(self.status()));
        }

        info!("Loading stored cart");
        match self.read_stored().await {
            Ok(cart) => {
                let entries = cart.len();
                self.inner.cart.send_replace(cart);
                self.inner.status.send_replace(LoadStatus::Ready);
                info!(entries, "Cart ready");
                Ok(())
            }
            Err(e) => {
                self.inner.status.send_replace(LoadStatus::Failed);
                error!(error = %e, "Failed to load stored cart");
                Err(e.into())
            }
        }
    }

    async fn read_stored(&self) -> std::result::Result<Cart, StorageReadFailure> {
        match self.inner.storage.get_boxed(CART_STORAGE_KEY).await? {
            Some(payload) => Ok(codec::decode(&payload)?),
            None => {
                debug!("No stored cart, starting empty");
                Ok(Cart::new())
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product, or increment it if it is already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` if the store has not finished loading.
    pub fn add_to_cart(&self, product: Product) -> Result<CartChange> {
        let id = product.id.clone();
        self.apply("add_to_cart", id.as_str(), |cart| cart.add(product))
    }

    /// Increase the quantity of `id` by one. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` if the store has not finished loading.
    pub fn increment(&self, id: &str) -> Result<CartChange> {
        self.apply("increment", id, |cart| cart.increment(id))
    }

    /// Decrease the quantity of `id` by one, removing it at zero. Unknown ids
    /// are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` if the store has not finished loading.
    pub fn decrement(&self, id: &str) -> Result<CartChange> {
        self.apply("decrement", id, |cart| cart.decrement(id))
    }

    /// Run one mutation against the current cart.
    ///
    /// Publishing and queueing happen under the channel lock so the writer
    /// sees snapshots in mutation order.
    fn apply(
        &self,
        operation: &'static str,
        id: &str,
        mutate: impl FnOnce(&mut Cart) -> CartChange,
    ) -> Result<CartChange> {
        let status = self.status();
        if status != LoadStatus::Ready {
            warn!(operation, id, %status, "Cart mutation rejected before ready");
            return Err(CartError::NotReady(status));
        }

        let mut change = CartChange::Unchanged;
        self.inner.cart.send_if_modified(|cart| {
            change = mutate(cart);
            if change.is_modified() {
                self.persist(cart);
            }
            change.is_modified()
        });

        if change.is_modified() {
            debug!(operation, id, ?change, "Cart updated");
        } else {
            debug!(operation, id, "Cart unchanged");
        }
        Ok(change)
    }

    fn persist(&self, cart: &Cart) {
        match codec::encode(cart) {
            Ok(payload) => self.inner.queue.enqueue(payload),
            Err(e) => error!(error = %e, "Failed to encode cart for persistence"),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.inner.cart.borrow().clone()
    }

    /// Run `f` against the current cart without cloning it.
    ///
    /// Mutations from other tasks wait while `f` runs, so keep it short.
    pub fn with_cart<R>(&self, f: impl FnOnce(&Cart) -> R) -> R {
        f(&self.inner.cart.borrow())
    }

    /// Receiver notified after every change to the cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.inner.cart.subscribe()
    }

    /// Current load status.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        *self.inner.status.borrow()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == LoadStatus::Ready
    }

    /// Wait until loading has finished.
    ///
    /// Never returns if nobody calls [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady(LoadStatus::Failed)` if the load failed.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut status = self.inner.status.subscribe();
        let outcome = status
            .wait_for(|s| matches!(s, LoadStatus::Ready | LoadStatus::Failed))
            .await
            .map_or(LoadStatus::Failed, |s| *s);
        match outcome {
            LoadStatus::Ready => Ok(()),
            other => Err(CartError::NotReady(other)),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Wait until every change made so far has been handed to storage.
    pub async fn flush(&self) {
        self.inner.queue.flush().await;
    }

    /// Number of snapshots written to storage.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.inner.queue.written()
    }

    /// Number of persistence writes that failed. Failures are logged, never
    /// returned from mutations.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.inner.queue.failed()
    }

    /// Number of snapshots dropped because a newer one was already queued.
    #[must_use]
    pub fn skipped_writes(&self) -> u64 {
        self.inner.queue.skipped()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::MemoryStore;

    fn product(id: &str) -> Product {
        Product::new(id, format!("Product {id}"), "u", "1.5".parse().unwrap())
    }

    fn ids_and_quantities(cart: &Cart) -> Vec<(String, u32)> {
        cart.iter()
            .map(|e| (e.id.to_string(), e.quantity()))
            .collect()
    }

    async fn ready_store(storage: &MemoryStore) -> CartStore {
        CartStore::open(storage.clone(), &CartConfig::default())
            .await
            .unwrap()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[tokio::test]
    async fn test_load_missing_payload_starts_empty() {
        let storage = MemoryStore::new();
        let store = CartStore::new(storage, &CartConfig::default());
        assert_eq!(store.status(), LoadStatus::Uninitialized);

        store.load().await.unwrap();

        assert_eq!(store.status(), LoadStatus::Ready);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_load_restores_stored_cart() {
        let payload = r#"[{"id":"p1","title":"Apple","image_url":"u","price":1.5,"quantity":1},{"id":"p2","title":"Pear","image_url":"u","price":2,"quantity":3}]"#;
        let storage = MemoryStore::with_value(CART_STORAGE_KEY, payload);

        let store = ready_store(&storage).await;

        assert_eq!(
            ids_and_quantities(&store.snapshot()),
            vec![("p1".to_string(), 1), ("p2".to_string(), 3)]
        );
        // Loading alone does not write anything back.
        store.flush().await;
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_load_malformed_payload_fails_loudly() {
        let storage = MemoryStore::with_value(CART_STORAGE_KEY, "{not a cart");
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        let err = store.load().await.unwrap_err();

        assert!(matches!(
            err,
            CartError::StorageRead(StorageReadFailure::Malformed(_))
        ));
        assert_eq!(store.status(), LoadStatus::Failed);
        assert!(store.snapshot().is_empty());
        assert!(matches!(
            store.add_to_cart(product("p1")),
            Err(CartError::NotReady(LoadStatus::Failed))
        ));
        // The bad payload is left in place for inspection.
        assert_eq!(storage.peek(CART_STORAGE_KEY).as_deref(), Some("{not a cart"));
    }

    #[tokio::test]
    async fn test_load_read_error_fails() {
        let storage = MemoryStore::new();
        storage.fail_reads(true);

        let err = CartStore::open(storage, &CartConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CartError::StorageRead(StorageReadFailure::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_load_twice_is_rejected() {
        let store = ready_store(&MemoryStore::new()).await;
        assert!(matches!(
            store.load().await,
            Err(CartError::InvalidState(LoadStatus::Ready))
        ));
    }

    #[tokio::test]
    async fn test_mutation_before_load_is_rejected() {
        let storage = MemoryStore::new();
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        assert!(matches!(
            store.add_to_cart(product("p1")),
            Err(CartError::NotReady(LoadStatus::Uninitialized))
        ));
        assert!(matches!(
            store.increment("p1"),
            Err(CartError::NotReady(LoadStatus::Uninitialized))
        ));
        assert!(matches!(
            store.decrement("p1"),
            Err(CartError::NotReady(LoadStatus::Uninitialized))
        ));

        store.load().await.unwrap();
        store.flush().await;
        assert!(store.snapshot().is_empty());
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_after_load() {
        let storage = MemoryStore::new();
        let store = CartStore::new(storage, &CartConfig::default());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        store.load().await.unwrap();
        waiter.await.unwrap().unwrap();
        assert!(store.is_ready());
    }

    #[tokio::test]
    async fn test_wait_ready_reports_failed_load() {
        let storage = MemoryStore::with_value(CART_STORAGE_KEY, "42");
        let store = CartStore::new(storage, &CartConfig::default());
        let _ = store.load().await;

        assert!(matches!(
            store.wait_ready().await,
            Err(CartError::NotReady(LoadStatus::Failed))
        ));
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    #[tokio::test]
    async fn test_add_then_add_again() {
        let store = ready_store(&MemoryStore::new()).await;

        assert_eq!(
            store
                .add_to_cart(Product::new("p1", "Apple", "u", "1.5".parse().unwrap()))
                .unwrap(),
            CartChange::Added
        );
        assert_eq!(
            ids_and_quantities(&store.snapshot()),
            vec![("p1".to_string(), 1)]
        );

        assert_eq!(
            store.add_to_cart(product("p1")).unwrap(),
            CartChange::Incremented { quantity: 2 }
        );
        assert_eq!(
            ids_and_quantities(&store.snapshot()),
            vec![("p1".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_decrement_removes_at_zero() {
        let store = ready_store(&MemoryStore::new()).await;
        store.add_to_cart(product("p1")).unwrap();
        store.add_to_cart(product("p2")).unwrap();
        store.increment("p2").unwrap();
        store.increment("p2").unwrap();

        assert_eq!(store.decrement("p1").unwrap(), CartChange::Removed);
        assert_eq!(
            ids_and_quantities(&store.snapshot()),
            vec![("p2".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop_and_not_persisted() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage).await;

        assert_eq!(store.increment("ghost").unwrap(), CartChange::Unchanged);
        assert_eq!(store.decrement("ghost").unwrap(), CartChange::Unchanged);
        store.flush().await;

        assert!(store.snapshot().is_empty());
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage).await;

        store.add_to_cart(product("p1")).unwrap();
        store.add_to_cart(product("p2")).unwrap();
        store.decrement("p1").unwrap();
        store.flush().await;

        let stored = codec::decode(&storage.peek(CART_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored, store.snapshot());
        assert_eq!(store.writes(), u64::try_from(storage.write_count()).unwrap());
    }

    #[tokio::test]
    async fn test_mutation_does_not_wait_for_storage() {
        let storage = MemoryStore::new();
        storage.set_write_delay(Duration::from_millis(200));
        let store = ready_store(&storage).await;

        let started = std::time::Instant::now();
        store.add_to_cart(product("p1")).unwrap();
        store.increment("p1").unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(store.snapshot().get("p1").unwrap().quantity(), 2);
        assert_eq!(storage.peek(CART_STORAGE_KEY), None);

        store.flush().await;
        assert!(storage.peek(CART_STORAGE_KEY).is_some());
    }

    #[tokio::test]
    async fn test_superseded_snapshots_are_skipped() {
        let storage = MemoryStore::new();
        storage.set_write_delay(Duration::from_millis(20));
        let store = ready_store(&storage).await;

        store.add_to_cart(product("p1")).unwrap();
        for _ in 0..9 {
            store.increment("p1").unwrap();
        }
        store.flush().await;

        assert_eq!(store.writes() + store.skipped_writes(), 10);
        assert!(store.skipped_writes() > 0);
        let stored = codec::decode(&storage.peek(CART_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.get("p1").unwrap().quantity(), 10);
    }

    #[tokio::test]
    async fn test_uncoalesced_store_skips_nothing() {
        let storage = MemoryStore::new();
        let config = CartConfig {
            coalesce_writes: false,
            ..CartConfig::default()
        };
        let store = CartStore::open(storage.clone(), &config).await.unwrap();

        store.add_to_cart(product("p1")).unwrap();
        store.increment("p1").unwrap();
        store.flush().await;

        assert_eq!(store.writes(), 2);
        assert_eq!(store.skipped_writes(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_authoritative() {
        let storage = MemoryStore::new();
        storage.fail_writes(true);
        let store = ready_store(&storage).await;

        assert_eq!(store.add_to_cart(product("p1")).unwrap(), CartChange::Added);
        store.flush().await;

        assert_eq!(store.write_failures(), 1);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(storage.peek(CART_STORAGE_KEY), None);

        // Storage recovers; the next change writes the full cart.
        storage.fail_writes(false);
        store.increment("p1").unwrap();
        store.flush().await;
        let stored = codec::decode(&storage.peek(CART_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.get("p1").unwrap().quantity(), 2);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ready_store(&MemoryStore::new()).await;
        let mut rx = store.subscribe();

        store.add_to_cart(product("p1")).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().total_quantity(), 1);

        // No-ops do not wake subscribers.
        store.increment("ghost").unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_with_cart_borrows_current_state() {
        let store = ready_store(&MemoryStore::new()).await;
        store.add_to_cart(product("p1")).unwrap();
        store.increment("p1").unwrap();

        let total = store.with_cart(Cart::total_quantity);
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = ready_store(&MemoryStore::new()).await;
        let other = store.clone();

        store.add_to_cart(product("p1")).unwrap();
        other.increment("p1").unwrap();

        assert_eq!(store.snapshot().get("p1").unwrap().quantity(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_are_not_lost() {
        let storage = MemoryStore::new();
        let store = ready_store(&storage).await;
        store.add_to_cart(product("p1")).unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        store.increment("p1").unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        store.flush().await;

        assert_eq!(store.snapshot().get("p1").unwrap().quantity(), 201);
        let stored = codec::decode(&storage.peek(CART_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.get("p1").unwrap().quantity(), 201);
    }
}
