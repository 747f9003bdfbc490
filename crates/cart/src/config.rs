//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `GOMARKET_STORAGE_DIR` - Directory for the file-backed store (default: `.gomarket`)
//! - `GOMARKET_COALESCE_WRITES` - Skip superseded snapshots already queued for
//!   persistence (default: `true`)
//!
//! The storage key itself is fixed and cannot be configured.

use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_STORAGE_DIR: &str = ".gomarket";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Root directory used by `FileStore::from_config`
    pub storage_dir: PathBuf,
    /// Write only the newest of several queued snapshots
    pub coalesce_writes: bool,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            coalesce_writes: true,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_dir = lookup("GOMARKET_STORAGE_DIR")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from);
        let coalesce_writes = lookup("GOMARKET_COALESCE_WRITES")
            .map_or(Ok(true), |v| parse_bool("GOMARKET_COALESCE_WRITES", &v))?;

        Ok(Self {
            storage_dir,
            coalesce_writes,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a boolean flag value.
fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got {other:?}"),
        )),
    }
}
