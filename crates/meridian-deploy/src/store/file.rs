//! JSON file document store.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{DeployError, DeployResult};

use super::DocumentStore;

/// Stores a document as pretty-printed JSON in a single file.
///
/// Saves go through a sibling temporary file and a rename, so a crash never
/// leaves a truncated document behind.
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    /// Create a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> DocumentStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> DeployResult<T> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            DeployError::storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            DeployError::storage(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, document: &T) -> DeployResult<()> {
        let mut raw = serde_json::to_string_pretty(document)?;
        raw.push('\n');

        let temp = self.temp_path();
        fs::write(&temp, raw).map_err(|e| {
            DeployError::storage(format!("failed to write {}: {e}", temp.display()))
        })?;
        fs::rename(&temp, &self.path).map_err(|e| {
            DeployError::storage(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), "document saved");
        Ok(())
    }
}
