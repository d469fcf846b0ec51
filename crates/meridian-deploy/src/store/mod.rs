//! Document storage backends.
//!
//! The project configuration and the manifest are loaded once per
//! invocation, mutated in memory by the controller, and written back through
//! a [`DocumentStore`]. The file implementation is what a CLI uses; the
//! in-memory implementation is provided for testing.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::DeployResult;

/// Backend for loading and persisting one document.
///
/// Writes are whole-document replacements. Implementations are called from
/// the controller only, never concurrently with a region fan-out.
pub trait DocumentStore<T>: Send + Sync {
    /// Load the current document.
    fn load(&self) -> DeployResult<T>;

    /// Replace the stored document.
    fn save(&self, document: &T) -> DeployResult<()>;
}
