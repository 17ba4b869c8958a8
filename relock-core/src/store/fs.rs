//! File system backed blob store.
//!
//! Writes follow the write-to-temp-then-rename sequence:
//!
//! 1. Write data to a temporary file in the same directory
//! 2. `fsync` the temporary file
//! 3. Rename the temporary file over the target name
//! 4. `fsync` the parent directory so the rename itself is durable

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::AtomicBlobStore;
use crate::error::{VaultError, VaultResult};

/// Blob store over a single directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    directory: PathBuf,
}

impl FsBlobStore {
    /// Creates a blob store for `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(directory: P) -> VaultResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| {
            VaultError::io(
                format!("creating data directory '{}'", directory.display()),
                e,
            )
        })?;
        Ok(Self { directory })
    }

    /// Opens a blob store over an existing directory without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if `directory` is missing or is not a directory.
    pub fn open_existing<P: AsRef<Path>>(directory: P) -> VaultResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        let metadata = fs::metadata(&directory).map_err(|e| {
            VaultError::io(
                format!("opening data directory '{}'", directory.display()),
                e,
            )
        })?;
        if !metadata.is_dir() {
            return Err(VaultError::io(
                format!("opening data directory '{}'", directory.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        Ok(Self { directory })
    }

    /// Returns the directory blobs live in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!(".{name}.tmp"))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> VaultResult<()> {
        let dir = File::open(&self.directory).map_err(|e| {
            VaultError::io(
                format!("opening directory '{}' for sync", self.directory.display()),
                e,
            )
        })?;
        dir.sync_all()
            .map_err(|e| VaultError::io("syncing data directory", e))
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn sync_directory(&self) -> VaultResult<()> {
        // Directories cannot be opened for sync here; rename is still atomic.
        Ok(())
    }
}

impl AtomicBlobStore for FsBlobStore {
    fn read(&self, name: &str) -> VaultResult<Option<Vec<u8>>> {
        let path = self.blob_path(name);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::io(format!("reading '{}'", path.display()), e)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> VaultResult<()> {
        let final_path = self.blob_path(name);
        let temp_path = self.temp_path(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| {
                VaultError::io(format!("creating '{}'", temp_path.display()), e)
            })?;
        file.write_all(bytes).map_err(|e| {
            VaultError::io(format!("writing '{}'", temp_path.display()), e)
        })?;
        file.sync_all().map_err(|e| {
            VaultError::io(format!("syncing '{}'", temp_path.display()), e)
        })?;
        drop(file);

        fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            VaultError::io(
                format!(
                    "renaming '{}' to '{}'",
                    temp_path.display(),
                    final_path.display()
                ),
                e,
            )
        })?;

        self.sync_directory()
    }

    fn delete(&self, name: &str) -> VaultResult<()> {
        let path = self.blob_path(name);
        match fs::remove_file(&path) {
            Ok(()) => self.sync_directory(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::io(format!("deleting '{}'", path.display()), e)),
        }
    }

    fn exists(&self, name: &str) -> VaultResult<bool> {
        Ok(self.blob_path(name).exists())
    }
}
