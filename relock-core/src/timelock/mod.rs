//! Timelock encryption boundary.
//!
//! The vault never implements the timelock scheme itself. It talks to a
//! [`TimelockProvider`] which maps instants to beacon rounds, encrypts to a
//! round, and decrypts once the round's beacon has been published.

mod drand;
mod http;

pub use drand::DrandTimelock;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::VaultResult;

/// Identifier of a beacon release (a drand round).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseId(u64);

impl ReleaseId {
    /// Wraps a raw round number.
    #[must_use]
    pub const fn new(round: u64) -> Self {
        Self(round)
    }

    /// Returns the raw round number.
    #[must_use]
    pub const fn round(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque ciphertext produced by a [`TimelockProvider`].
///
/// The vault only stores and hands it back; its encoding belongs to the
/// provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(String);

impl Ciphertext {
    /// Wraps a provider-encoded ciphertext.
    #[must_use]
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded ciphertext.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 based tag that identifies this ciphertext in logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ciphertext").field(&self.fingerprint()).finish()
    }
}

/// Timelock encryption bound to a public randomness beacon.
pub trait TimelockProvider: Send + Sync {
    /// Maps an instant to the release that becomes public at that instant.
    ///
    /// Deterministic and monotonic: a later instant never maps to an earlier
    /// release.
    fn round_for(&self, instant: DateTime<Utc>) -> ReleaseId;

    /// Encrypts `plaintext` so that it opens only once `release` is public.
    ///
    /// # Errors
    ///
    /// Returns an error only if the provider's key material is unusable.
    fn encrypt(&self, release: ReleaseId, plaintext: &[u8]) -> VaultResult<Ciphertext>;

    /// Attempts to open `ciphertext`.
    ///
    /// Fails with [`VaultError::NotYetAvailable`] while the bound release is
    /// still in the future. That failure, like
    /// [`VaultError::Network`], is expected and retriable.
    ///
    /// [`VaultError::NotYetAvailable`]: crate::VaultError::NotYetAvailable
    /// [`VaultError::Network`]: crate::VaultError::Network
    fn decrypt(
        &self,
        ciphertext: &Ciphertext,
    ) -> impl Future<Output = VaultResult<Zeroizing<Vec<u8>>>> + Send;
}

impl<P: TimelockProvider> TimelockProvider for std::sync::Arc<P> {
    fn round_for(&self, instant: DateTime<Utc>) -> ReleaseId {
        (**self).round_for(instant)
    }

    fn encrypt(&self, release: ReleaseId, plaintext: &[u8]) -> VaultResult<Ciphertext> {
        (**self).encrypt(release, plaintext)
    }

    fn decrypt(
        &self,
        ciphertext: &Ciphertext,
    ) -> impl Future<Output = VaultResult<Zeroizing<Vec<u8>>>> + Send {
        (**self).decrypt(ciphertext)
    }
}
