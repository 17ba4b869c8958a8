//! In-memory blob store.

use std::collections::HashMap;
use std::sync::Mutex;

use super::AtomicBlobStore;
use crate::error::{VaultError, VaultResult};

/// Blob store that keeps everything in a map.
///
/// Useful for tests and for embedding the vault where persistence is handled
/// elsewhere.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> VaultError {
    VaultError::io(
        "in-memory blob store",
        std::io::Error::other("mutex poisoned"),
    )
}

impl AtomicBlobStore for InMemoryBlobStore {
    fn read(&self, name: &str) -> VaultResult<Option<Vec<u8>>> {
        let guard = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(guard.get(name).cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> VaultResult<()> {
        self.blobs
            .lock()
            .map_err(|_| poisoned())?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        self.blobs.lock().map_err(|_| poisoned())?.remove(name);
        Ok(())
    }
}
