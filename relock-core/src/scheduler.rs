//! The rolling scheduler.
//!
//! A vault moves through two states. `Bootstrapping` is entered at most once,
//! when fresh credentials were supplied: they are locked to the next release
//! and their source files are deleted. `Rolling` never ends on its own: it
//! waits until the current artifact's release is public, decrypts it and
//! immediately locks the recovered secret to the following release. The only
//! way out is the shutdown future passed to [`Scheduler::run`] or a fatal
//! error.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bootstrap::Mode;
use crate::config::SchedulePolicy;
use crate::credentials::CredentialPair;
use crate::error::{VaultError, VaultResult};
use crate::schedule::{next_activation, wake_delay, Clock};
use crate::store::{ArtifactStore, LockedArtifact};
use crate::timelock::TimelockProvider;

enum VaultState {
    Bootstrapping(CredentialPair),
    Rolling,
}

impl From<Mode> for VaultState {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Bootstrap(credentials) => Self::Bootstrapping(credentials),
            Mode::Resume => Self::Rolling,
        }
    }
}

/// Drives the vault: initial lock, then the perpetual decrypt and re-lock
/// cycle.
pub struct Scheduler<P, C> {
    provider: P,
    store: ArtifactStore,
    clock: C,
    policy: SchedulePolicy,
}

impl<P: TimelockProvider, C: Clock> Scheduler<P, C> {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new(provider: P, store: ArtifactStore, clock: C, policy: SchedulePolicy) -> Self {
        Self {
            provider,
            store,
            clock,
            policy,
        }
    }

    /// Runs the vault until `shutdown` completes.
    ///
    /// Locks `mode`'s credentials first if there are any, then rolls forever.
    /// Deferred rolls (release not yet public, beacon unreachable) are retried
    /// with the artifact left untouched.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error: a missing or corrupt artifact,
    /// malformed ciphertext, or a storage failure.
    pub async fn run<F>(&self, mode: Mode, shutdown: F) -> VaultResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        let mut state = VaultState::from(mode);
        let mut deferred: u32 = 0;
        let mut retry_delays: Option<ExponentialBackoff> = None;

        loop {
            state = match state {
                VaultState::Bootstrapping(credentials) => {
                    self.lock_credentials(credentials)?;
                    VaultState::Rolling
                }
                VaultState::Rolling => {
                    let artifact = self.store.load()?.ok_or(VaultError::MissingArtifact)?;

                    let delay = self.wake_delay(&artifact).or_else(|| {
                        retry_delays.as_mut().map(|delays| {
                            delays.next().unwrap_or(self.policy.retry_max_delay)
                        })
                    });
                    if let Some(delay) = delay {
                        debug!(?delay, activation = %artifact.activation, "sleeping until release");
                        tokio::select! {
                            () = self.clock.sleep(delay) => {}
                            () = &mut shutdown => {
                                info!("shutdown requested while waiting");
                                return Ok(());
                            }
                        }
                    }

                    let outcome = tokio::select! {
                        outcome = self.roll(&artifact) => outcome,
                        () = &mut shutdown => {
                            info!("shutdown requested during roll");
                            return Ok(());
                        }
                    };
                    match outcome {
                        Ok(_) => {
                            deferred = 0;
                            retry_delays = None;
                        }
                        Err(err) if err.is_retryable() => {
                            deferred += 1;
                            if deferred >= self.policy.alert_after {
                                warn!(
                                    deferred,
                                    activation = %artifact.activation,
                                    error = %err,
                                    "release still unavailable after repeated attempts; beacon outage or clock skew"
                                );
                            } else {
                                info!(deferred, error = %err, "roll deferred");
                            }
                            retry_delays.get_or_insert_with(|| self.retry_backoff());
                        }
                        Err(err) => return Err(err),
                    }
                    VaultState::Rolling
                }
            };
        }
    }

    /// Locks freshly supplied credentials and deletes their source files.
    ///
    /// Any existing artifact is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or persistence fails. The bootstrap
    /// inputs are only deleted once the artifact has been saved.
    pub fn lock_credentials(&self, credentials: CredentialPair) -> VaultResult<LockedArtifact> {
        if !matches!(self.store.load(), Ok(None)) {
            warn!("bootstrap inputs present; replacing the existing artifact");
        }
        let payload = credentials.payload();
        drop(credentials);

        let activation = next_activation(self.clock.now(), None, &self.policy);
        let artifact = self.seal(&payload, activation)?;
        drop(payload);
        self.store.save(&artifact)?;
        self.store.delete_bootstrap_inputs()?;
        info!(activation = %artifact.activation, "credentials locked");
        Ok(artifact)
    }

    /// How long to wait before `artifact` can be rolled, if at all.
    #[must_use]
    pub fn wake_delay(&self, artifact: &LockedArtifact) -> Option<Duration> {
        wake_delay(artifact.activation, self.clock.now(), &self.policy)
    }

    /// Decrypts `artifact` and replaces it with a lock on the next release.
    ///
    /// # Errors
    ///
    /// Fails with a retryable error while the release is unavailable; the
    /// stored artifact is then left as it was.
    pub async fn roll(&self, artifact: &LockedArtifact) -> VaultResult<LockedArtifact> {
        let plaintext = self.provider.decrypt(&artifact.ciphertext).await?;
        let activation = next_activation(self.clock.now(), Some(artifact.activation), &self.policy);
        let next = self.seal(&plaintext, activation)?;
        drop(plaintext);
        self.store.save(&next)?;
        info!(
            from = %artifact.activation,
            to = %next.activation,
            "vault rolled"
        );
        Ok(next)
    }

    fn seal(&self, payload: &[u8], activation: DateTime<Utc>) -> VaultResult<LockedArtifact> {
        let release = self.provider.round_for(activation);
        let ciphertext = self.provider.encrypt(release, payload)?;
        debug!(%release, fingerprint = %ciphertext.fingerprint(), "sealed payload");
        Ok(LockedArtifact::new(ciphertext, activation))
    }

    fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.policy.retry_min_delay)
            .with_max_delay(self.policy.retry_max_delay)
            .without_max_times()
            .build()
    }
}
