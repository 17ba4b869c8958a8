//! Durable storage for the vault's files.
//!
//! Everything the vault persists goes through [`AtomicBlobStore`], so the
//! bootstrap resolver and the artifact store work the same against the
//! filesystem and against memory.

mod artifact;
mod fs;
mod memory;

pub use artifact::{ArtifactStore, LockedArtifact};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;

use crate::error::VaultResult;

/// Atomic storage for small files, addressed by name.
///
/// Writes MUST replace the previous content wholesale: a reader observes
/// either the complete old content or the complete new content, never a mix.
pub trait AtomicBlobStore: Send + Sync {
    /// Reads a blob by name.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails (e.g., I/O error, permission denied).
    fn read(&self, name: &str) -> VaultResult<Option<Vec<u8>>>;

    /// Atomically writes a blob, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> VaultResult<()>;

    /// Deletes a blob. Deleting a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for actual I/O failures.
    fn delete(&self, name: &str) -> VaultResult<()>;

    /// Checks if a blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read operation fails.
    fn exists(&self, name: &str) -> VaultResult<bool> {
        Ok(self.read(name)?.is_some())
    }
}

impl<S: AtomicBlobStore + ?Sized> AtomicBlobStore for std::sync::Arc<S> {
    fn read(&self, name: &str) -> VaultResult<Option<Vec<u8>>> {
        (**self).read(name)
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> VaultResult<()> {
        (**self).write_atomic(name, bytes)
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        (**self).delete(name)
    }

    fn exists(&self, name: &str) -> VaultResult<bool> {
        (**self).exists(name)
    }
}
