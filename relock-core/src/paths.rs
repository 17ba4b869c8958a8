//! Vault path helpers.

use std::path::{Path, PathBuf};

/// Bootstrap input holding the 4 digit code.
pub const CODE_FILENAME: &str = "pin.txt";
/// Bootstrap input holding the password line.
pub const PASSWORD_FILENAME: &str = "password.txt";
/// The persisted locked artifact.
pub const ARTIFACT_FILENAME: &str = "encrypted.txt";
const LOCK_FILENAME: &str = "lock";

/// Paths for vault files under a single data directory.
#[derive(Debug, Clone)]
pub struct VaultPaths {
    data_dir: PathBuf,
}

impl VaultPaths {
    /// Builds vault paths rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the path to the code bootstrap file.
    #[must_use]
    pub fn code_path(&self) -> PathBuf {
        self.data_dir.join(CODE_FILENAME)
    }

    /// Returns the path to the password bootstrap file.
    #[must_use]
    pub fn password_path(&self) -> PathBuf {
        self.data_dir.join(PASSWORD_FILENAME)
    }

    /// Returns the path to the locked artifact.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join(ARTIFACT_FILENAME)
    }

    /// Returns the path to the process lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILENAME)
    }
}
