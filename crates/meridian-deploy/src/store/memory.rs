//! In-memory document store for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{DeployError, DeployResult};

use super::DocumentStore;

/// In-memory document store for testing.
///
/// Keeps the last saved document and counts saves, so tests can assert on
/// what the controller persisted and how often.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    document: RwLock<T>,
    saves: AtomicUsize,
}

impl<T: Clone> MemoryStore<T> {
    /// Create a store holding an initial document.
    #[must_use]
    pub fn new(document: T) -> Self {
        Self {
            document: RwLock::new(document),
            saves: AtomicUsize::new(0),
        }
    }

    /// The last saved (or initial) document.
    pub fn current(&self) -> DeployResult<T> {
        self.load_inner()
    }

    /// Number of times `save` has been called.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn load_inner(&self) -> DeployResult<T> {
        let document = self
            .document
            .read()
            .map_err(|_| DeployError::internal("lock poisoned"))?;
        Ok(document.clone())
    }
}

impl<T> DocumentStore<T> for MemoryStore<T>
where
    T: Clone + Send + Sync,
{
    fn load(&self) -> DeployResult<T> {
        self.load_inner()
    }

    fn save(&self, document: &T) -> DeployResult<()> {
        let mut stored = self
            .document
            .write()
            .map_err(|_| DeployError::internal("lock poisoned"))?;
        *stored = document.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
