//! Startup mode resolution.
//!
//! Decides, from file contents alone, whether the vault starts by locking
//! fresh credential material or resumes rolling an existing artifact. Runs
//! before any cryptographic operation and only reads.

use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::credentials::CredentialPair;
use crate::error::{VaultError, VaultResult};
use crate::paths::{ARTIFACT_FILENAME, CODE_FILENAME, PASSWORD_FILENAME};
use crate::store::AtomicBlobStore;

/// How the vault starts.
#[derive(Debug)]
pub enum Mode {
    /// Lock the given credentials, then roll.
    Bootstrap(CredentialPair),
    /// Roll the artifact already on disk.
    Resume,
}

/// Resolves the startup mode from the bootstrap inputs and the artifact.
///
/// # Errors
///
/// - [`VaultError::InvalidBootstrapFormat`] if a present code or password file
///   is malformed.
/// - [`VaultError::InconsistentBootstrapState`] if only one of them exists.
/// - [`VaultError::NoValidMode`] if there are no bootstrap inputs and no
///   non-empty artifact.
pub fn resolve(blobs: &dyn AtomicBlobStore) -> VaultResult<Mode> {
    let code = read_input(blobs, CODE_FILENAME)?;
    let password = read_input(blobs, PASSWORD_FILENAME)?;

    match (code, password) {
        (Some(code), Some(password)) => {
            let code = validate_code(&code)?;
            let password = validate_password(&password)?;
            return Ok(Mode::Bootstrap(CredentialPair::new(code, password)));
        }
        (Some(_), None) => {
            return Err(VaultError::InconsistentBootstrapState {
                present: CODE_FILENAME.to_string(),
                missing: PASSWORD_FILENAME.to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(VaultError::InconsistentBootstrapState {
                present: PASSWORD_FILENAME.to_string(),
                missing: CODE_FILENAME.to_string(),
            });
        }
        (None, None) => {}
    }

    match blobs.read(ARTIFACT_FILENAME)? {
        Some(bytes) if bytes.iter().any(|b| !b.is_ascii_whitespace()) => Ok(Mode::Resume),
        _ => Err(VaultError::NoValidMode),
    }
}

fn read_input(blobs: &dyn AtomicBlobStore, name: &str) -> VaultResult<Option<Zeroizing<Vec<u8>>>> {
    Ok(blobs.read(name)?.map(Zeroizing::new))
}

fn invalid(file: &str, reason: &str) -> VaultError {
    VaultError::InvalidBootstrapFormat {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_code(raw: &[u8]) -> VaultResult<SecretString> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| invalid(CODE_FILENAME, "must be UTF-8 text"))?
        .trim();
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(
            CODE_FILENAME,
            "must contain exactly one line with exactly 4 digits",
        ));
    }
    Ok(SecretString::from(text))
}

fn validate_password(raw: &[u8]) -> VaultResult<SecretString> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| invalid(PASSWORD_FILENAME, "must be UTF-8 text"))?
        .trim();
    if text.is_empty() || text.contains('\n') {
        return Err(invalid(
            PASSWORD_FILENAME,
            "must contain exactly one non-empty line",
        ));
    }
    Ok(SecretString::from(text))
}
