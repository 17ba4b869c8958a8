//! The persisted locked artifact.
//!
//! On disk the artifact is UTF-8 text: the provider's ciphertext, a newline,
//! then the activation instant. The instant is always the last line, so the
//! ciphertext may itself span several lines.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use super::AtomicBlobStore;
use crate::error::{VaultError, VaultResult};
use crate::paths::{ARTIFACT_FILENAME, CODE_FILENAME, PASSWORD_FILENAME};
use crate::timelock::Ciphertext;

/// The vault's single outstanding lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedArtifact {
    /// Ciphertext bound to the release at `activation`.
    pub ciphertext: Ciphertext,
    /// Instant at which the bound release becomes public.
    pub activation: DateTime<Utc>,
}

impl LockedArtifact {
    /// Creates an artifact.
    #[must_use]
    pub const fn new(ciphertext: Ciphertext, activation: DateTime<Utc>) -> Self {
        Self {
            ciphertext,
            activation,
        }
    }

    /// Renders the on-disk text form.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}\n{}",
            self.ciphertext.as_str(),
            self.activation.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// Parses the on-disk text form. A trailing newline is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CorruptArtifact`] if the instant line is missing
    /// or unparseable, or if there is no ciphertext before it.
    pub fn parse(text: &str) -> VaultResult<Self> {
        let text = text.trim_end();
        let (ciphertext, instant) = text.rsplit_once('\n').ok_or_else(|| {
            VaultError::CorruptArtifact("missing activation instant line".to_string())
        })?;
        let ciphertext = ciphertext.trim();
        if ciphertext.is_empty() {
            return Err(VaultError::CorruptArtifact("empty ciphertext".to_string()));
        }
        let activation = parse_instant(instant.trim())?;
        Ok(Self::new(Ciphertext::new(ciphertext), activation))
    }
}

fn parse_instant(raw: &str) -> VaultResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| {
            VaultError::CorruptArtifact(format!("unparseable activation instant '{raw}': {err}"))
        })
}

/// Reads and replaces the locked artifact, and removes consumed bootstrap
/// inputs.
#[derive(Clone)]
pub struct ArtifactStore {
    blobs: Arc<dyn AtomicBlobStore>,
}

impl ArtifactStore {
    /// Creates an artifact store over `blobs`.
    #[must_use]
    pub fn new(blobs: Arc<dyn AtomicBlobStore>) -> Self {
        Self { blobs }
    }

    /// Returns the underlying blob store.
    #[must_use]
    pub fn blobs(&self) -> &dyn AtomicBlobStore {
        self.blobs.as_ref()
    }

    /// Loads the current artifact, if any. A blank file counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::CorruptArtifact`] if the content cannot be
    /// parsed, or an I/O error if it cannot be read.
    pub fn load(&self) -> VaultResult<Option<LockedArtifact>> {
        let Some(bytes) = self.blobs.read(ARTIFACT_FILENAME)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes)
            .map_err(|_| VaultError::CorruptArtifact("artifact is not UTF-8".to_string()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        LockedArtifact::parse(&text).map(Some)
    }

    /// Replaces the persisted artifact with `artifact`.
    ///
    /// # Errors
    ///
    /// Returns an error if the atomic write fails; the previous artifact is
    /// then still intact.
    pub fn save(&self, artifact: &LockedArtifact) -> VaultResult<()> {
        self.blobs
            .write_atomic(ARTIFACT_FILENAME, artifact.encode().as_bytes())?;
        info!(
            fingerprint = %artifact.ciphertext.fingerprint(),
            activation = %artifact.activation,
            "artifact saved"
        );
        Ok(())
    }

    /// Deletes the code and password bootstrap files.
    ///
    /// Both deletions are attempted even if the first fails, so a single
    /// failure leaves as few inputs behind as possible.
    ///
    /// # Errors
    ///
    /// Returns the first deletion error.
    pub fn delete_bootstrap_inputs(&self) -> VaultResult<()> {
        let mut first_error = None;
        for name in [PASSWORD_FILENAME, CODE_FILENAME] {
            if let Err(err) = self.blobs.delete(name) {
                warn!(file = name, error = %err, "cannot delete bootstrap input");
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        info!("bootstrap inputs deleted");
        Ok(())
    }
}
