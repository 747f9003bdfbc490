//! In-process storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{KeyValueStore, StorageError};

/// Map-backed [`KeyValueStore`].
///
/// Clones share the same map, so a test can keep one handle to inspect what
/// the cart wrote through another. Reads and writes can be made to fail, and
/// writes can be slowed down, to exercise the cart's error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: Mutex<HashMap<String, String>>,
    history: Mutex<Vec<(String, String)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one value already present.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        lock(&store.inner.values).insert(key.into(), value.into());
        store
    }

    /// Read a value without going through the async interface.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        lock(&self.inner.values).get(key).cloned()
    }

    /// Every successful write, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(String, String)> {
        lock(&self.inner.history).clone()
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock(&self.inner.history).len()
    }

    /// Make subsequent reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before applying each write.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.inner.write_delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("read of {key} refused")));
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let delay = self.inner.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("write of {key} refused")));
        }
        lock(&self.inner.values).insert(key.to_owned(), value.to_owned());
        lock(&self.inner.history).push((key.to_owned(), value.to_owned()));
        Ok(())
    }
}

/// Lock a mutex, recovering the data if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
