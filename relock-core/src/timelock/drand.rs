//! drand-backed timelock provider.
//!
//! Identity-based encryption to a future round is delegated to `tlock_age`;
//! this module only knows the chain parameters and how to fetch a round's
//! signature once it has been published.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::http::Request;
use super::{Ciphertext, ReleaseId, TimelockProvider};
use crate::config::DrandConfig;
use crate::error::{VaultError, VaultResult};

/// Chain parameters as served by `GET /{chain}/info`.
#[derive(Debug, Deserialize)]
struct ChainInfo {
    public_key: String,
    period: u64,
    genesis_time: i64,
    hash: String,
}

/// A published round as served by `GET /{chain}/public/{round}`.
#[derive(Debug, Deserialize)]
struct Beacon {
    round: u64,
    signature: String,
}

/// Timelock provider backed by a drand chain.
pub struct DrandTimelock {
    request: Request,
    base_url: String,
    chain_hash_hex: String,
    chain_hash: Vec<u8>,
    public_key: Vec<u8>,
    genesis_time: i64,
    period: u64,
}

impl DrandTimelock {
    /// Fetches the chain parameters and builds a provider for them.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Network`] if the relay cannot be reached, or
    /// [`VaultError::Beacon`] if it serves a different chain or unusable
    /// parameters.
    pub async fn connect(config: &DrandConfig) -> VaultResult<Self> {
        let request = Request::new(config);
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let chain_hash_hex = config.chain_hash.to_ascii_lowercase();
        let url = format!("{base_url}/{chain_hash_hex}/info");

        let response = request.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(unexpected_status(&url, status));
        }
        let info: ChainInfo = response
            .json()
            .await
            .map_err(|err| body_error(&url, status, &err))?;

        if !info.hash.eq_ignore_ascii_case(&chain_hash_hex) {
            return Err(VaultError::Beacon(format!(
                "relay serves chain {} but {chain_hash_hex} was requested",
                info.hash
            )));
        }
        if info.period == 0 {
            return Err(VaultError::Beacon("chain period is zero".to_string()));
        }
        let chain_hash = hex::decode(&chain_hash_hex)
            .map_err(|err| VaultError::Beacon(format!("invalid chain hash: {err}")))?;
        let public_key = hex::decode(&info.public_key)
            .map_err(|err| VaultError::Beacon(format!("invalid chain public key: {err}")))?;

        info!(
            chain = %chain_hash_hex,
            period = info.period,
            genesis = info.genesis_time,
            "connected to drand"
        );
        Ok(Self {
            request,
            base_url,
            chain_hash_hex,
            chain_hash,
            public_key,
            genesis_time: info.genesis_time,
            period: info.period,
        })
    }

    async fn fetch_signature(&self, round: u64) -> VaultResult<Vec<u8>> {
        let url = format!("{}/{}/public/{round}", self.base_url, self.chain_hash_hex);
        let response = self.request.get(&url).await?;
        let status = response.status();
        if status == StatusCode::TOO_EARLY || status == StatusCode::NOT_FOUND {
            return Err(VaultError::NotYetAvailable { round });
        }
        if !status.is_success() {
            return Err(unexpected_status(&url, status));
        }
        let beacon: Beacon = response
            .json()
            .await
            .map_err(|err| body_error(&url, status, &err))?;
        if beacon.round != round {
            return Err(VaultError::Beacon(format!(
                "asked for round {round}, got round {}",
                beacon.round
            )));
        }
        hex::decode(&beacon.signature)
            .map_err(|err| VaultError::Beacon(format!("invalid beacon signature: {err}")))
    }
}

/// A relay answering with an unexpected status is treated like an unreachable
/// one: a CDN or proxy error page says nothing about the chain itself.
fn unexpected_status(url: &str, status: StatusCode) -> VaultError {
    VaultError::Network {
        url: url.to_string(),
        status: Some(status.as_u16()),
        error: format!("unexpected status {status}"),
    }
}

/// Stalled, truncated or garbled bodies are transient.
fn body_error(url: &str, status: StatusCode, err: &reqwest::Error) -> VaultError {
    VaultError::Network {
        url: url.to_string(),
        status: Some(status.as_u16()),
        error: format!("reading response body failed: {err}"),
    }
}

impl TimelockProvider for DrandTimelock {
    fn round_for(&self, instant: DateTime<Utc>) -> ReleaseId {
        let elapsed_ms = instant.timestamp_millis() - self.genesis_time.saturating_mul(1000);
        let elapsed_ms = u64::try_from(elapsed_ms).unwrap_or(0);
        ReleaseId::new(elapsed_ms / (self.period * 1000) + 1)
    }

    fn encrypt(&self, release: ReleaseId, plaintext: &[u8]) -> VaultResult<Ciphertext> {
        let mut sealed = Vec::new();
        tlock_age::encrypt(
            &mut sealed,
            plaintext,
            &self.chain_hash,
            &self.public_key,
            release.round(),
        )
        .map_err(|err| VaultError::Beacon(format!("timelock encryption failed: {err}")))?;
        Ok(Ciphertext::new(BASE64_STANDARD.encode(sealed)))
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> VaultResult<Zeroizing<Vec<u8>>> {
        let sealed = BASE64_STANDARD
            .decode(ciphertext.as_str().trim())
            .map_err(|err| VaultError::MalformedCiphertext(format!("invalid base64: {err}")))?;
        let round = tlock_age::decrypt_header(sealed.as_slice())
            .map_err(|err| VaultError::MalformedCiphertext(format!("invalid header: {err}")))?
            .round();

        let current = self.round_for(Utc::now());
        if round > current.round() {
            debug!(round, current = current.round(), "release still in the future");
            return Err(VaultError::NotYetAvailable { round });
        }

        let signature = self.fetch_signature(round).await?;
        let mut plaintext = Zeroizing::new(Vec::new());
        tlock_age::decrypt(&mut *plaintext, sealed.as_slice(), &self.chain_hash, &signature)
            .map_err(|err| VaultError::MalformedCiphertext(format!("decryption failed: {err}")))?;
        Ok(plaintext)
    }
}
