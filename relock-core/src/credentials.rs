//! The credential pair held by the vault.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Separator between code and password in the locked payload.
pub const PAYLOAD_SEPARATOR: char = ':';

/// A 4 digit code and a password line.
///
/// Only exists during bootstrap. Both halves are zeroized when the pair is
/// dropped.
#[derive(Debug)]
pub struct CredentialPair {
    code: SecretString,
    password: SecretString,
}

impl CredentialPair {
    /// Wraps already validated credential material.
    #[must_use]
    pub const fn new(code: SecretString, password: SecretString) -> Self {
        Self { code, password }
    }

    /// Combines the pair into the `code:password` payload that gets locked.
    #[must_use]
    pub fn payload(&self) -> Zeroizing<Vec<u8>> {
        let code = self.code.expose_secret();
        let password = self.password.expose_secret();
        let mut payload = Zeroizing::new(Vec::with_capacity(code.len() + 1 + password.len()));
        payload.extend_from_slice(code.as_bytes());
        let mut separator = [0u8; 4];
        payload.extend_from_slice(PAYLOAD_SEPARATOR.encode_utf8(&mut separator).as_bytes());
        payload.extend_from_slice(password.as_bytes());
        payload
    }
}
