//! Filesystem storage backend.
//!
//! Each key maps to one file under a root directory. Writes land in a
//! sibling temporary file first and are renamed over the target, so a reader
//! sees either the old payload or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::{KeyValueStore, StorageError};
use crate::config::CartConfig;

/// Directory-backed [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at the configured storage directory.
    #[must_use]
    pub fn from_config(config: &CartConfig) -> Self {
        Self::new(config.storage_dir.clone())
    }

    /// Root directory holding the stored values.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(file_name_for(key))
    }
}

impl KeyValueStore for FileStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored value");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, value), fields(root = %self.root.display(), bytes = value.len()))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let target = self.path_for(key);
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }
}

/// Map a key to a file name.
///
/// ASCII letters, digits, `.`, `_` and `-` pass through; every other byte is
/// written as `%XX`. A leading `.` is escaped too so keys never become hidden
/// files or `..`.
fn file_name_for(key: &str) -> String {
    use std::fmt::Write;

    let mut name = String::with_capacity(key.len() + 5);
    for (i, byte) in key.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'_' | b'-')
            || (byte == b'.' && i > 0);
        if keep {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "%{byte:02X}");
        }
    }
    name.push_str(".json");
    name
}
