//! Integration tests for the GoMarket cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gomarket-integration-tests
//!
//! # With cart logs
//! RUST_LOG=gomarket_cart=debug cargo test -p gomarket-integration-tests -- --nocapture
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - Restarts over the file store, write ordering, failures
//! - `cart_scope` - Task-scoped access from consumer code
//!
//! This library holds the shared fixtures those tests use.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Once;

use gomarket_cart::{CartConfig, CartStore, FileStore};
use gomarket_core::{Price, Product};
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING: Once = Once::new();

/// Install a test tracing subscriber once per test binary.
///
/// Defaults to debug level for the cart crate if `RUST_LOG` is not set.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "gomarket_cart=debug".into());

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// A product with a fixed title and image and the given price in cents.
#[must_use]
pub fn product(id: &str, cents: i64) -> Product {
    Product::new(
        id,
        format!("Product {id}"),
        format!("https://img.gomarket.test/{id}.png"),
        Price::from_cents(cents),
    )
}

/// A temporary storage directory that is removed when dropped.
pub struct TestStorage {
    dir: TempDir,
}

impl TestStorage {
    /// Create a fresh, empty storage directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Config pointing at this directory.
    #[must_use]
    pub fn config(&self) -> CartConfig {
        CartConfig {
            storage_dir: self.dir.path().to_path_buf(),
            ..CartConfig::default()
        }
    }

    /// A file store over this directory.
    #[must_use]
    pub fn file_store(&self) -> FileStore {
        FileStore::from_config(&self.config())
    }

    /// Open a cart over this directory, as a fresh process would.
    ///
    /// # Errors
    ///
    /// Returns the store's load error.
    pub async fn open(&self) -> gomarket_cart::Result<CartStore> {
        CartStore::open(self.file_store(), &self.config()).await
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}
