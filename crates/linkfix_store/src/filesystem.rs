//! Filesystem-based document backend.
//!
//! Document keys are relative paths under a root directory, mirroring the
//! bot's `data/` layout:
//!
//! ```text
//! data/
//! ├── image_macros.json
//! ├── requests.json
//! └── rpg/
//!     ├── players.json
//!     └── channels.json
//! ```
//!
//! An absolute key bypasses the root.

use crate::DocumentBackend;
use linkfix_error::{StoreError, StoreErrorKind, StoreResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Filesystem document backend.
///
/// Writes go to a `.tmp` sibling first and are renamed into place, so a crash
/// mid-write leaves the previous document intact. Parent directories are
/// created on demand.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    ///
    /// Creates the root directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(root))]
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();

        std::fs::create_dir_all(&root).map_err(|e| {
            StoreError::new(StoreErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;

        tracing::info!(path = %root.display(), "Created filesystem document backend");
        Ok(Self { root })
    }

    /// Root directory documents are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a document key to a filesystem path.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait::async_trait]
impl DocumentBackend for FileSystemBackend {
    #[tracing::instrument(skip(self))]
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key);

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::new(StoreErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))),
        }
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::new(StoreErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path = Self::temp_path(&path);
        tokio::fs::write(&temp_path, bytes).await.map_err(|e| {
            StoreError::new(StoreErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StoreError::new(StoreErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Wrote document");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
