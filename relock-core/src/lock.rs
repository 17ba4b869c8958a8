//! Single-instance lock for a data directory.
//!
//! Two rolling loops over one artifact would race each other's re-encryption,
//! so the runner holds an exclusive `flock` on `<data>/lock` for its whole
//! lifetime. On non-Unix targets the lock is a no-op.

use std::path::Path;

use crate::error::{VaultError, VaultResult};

#[cfg(not(unix))]
mod imp {
    use super::*;

    /// No-op vault lock.
    #[derive(Debug)]
    pub struct VaultLock;

    impl VaultLock {
        /// Always succeeds.
        ///
        /// # Errors
        ///
        /// Never fails on this target.
        pub fn acquire(_path: &Path) -> VaultResult<Self> {
            Ok(Self)
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use std::fs::{self, File, OpenOptions};
    use std::os::raw::c_int;
    use std::os::unix::io::AsRawFd;

    const LOCK_EX: c_int = 2;
    const LOCK_NB: c_int = 4;
    const LOCK_UN: c_int = 8;

    extern "C" {
        fn flock(fd: c_int, operation: c_int) -> c_int;
    }

    /// Exclusive lock on the data directory, released on drop.
    #[derive(Debug)]
    pub struct VaultLock {
        file: File,
    }

    impl VaultLock {
        /// Opens or creates the lock file at `path` and takes the lock
        /// without blocking.
        ///
        /// # Errors
        ///
        /// Returns [`VaultError::AlreadyRunning`] if another process holds
        /// the lock, or [`VaultError::Lock`] if the file cannot be locked.
        pub fn acquire(path: &Path) -> VaultResult<Self> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| VaultError::Lock(err.to_string()))?;
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|err| VaultError::Lock(err.to_string()))?;

            let result = unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) };
            if result == 0 {
                return Ok(Self { file });
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                Err(VaultError::AlreadyRunning)
            } else {
                Err(VaultError::Lock(err.to_string()))
            }
        }
    }

    impl Drop for VaultLock {
        fn drop(&mut self) {
            let _ = unsafe { flock(self.file.as_raw_fd(), LOCK_UN) };
        }
    }
}

pub use imp::VaultLock;
