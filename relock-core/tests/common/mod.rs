//! Common test utilities shared across integration tests.

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relock_core::{
    Ciphertext, Clock, ReleaseId, ReleaseZone, SchedulePolicy, TimelockProvider, VaultError,
    VaultResult,
};
use tokio::sync::Notify;
use zeroize::Zeroizing;

/// Clock that jumps forward on every sleep and hangs once it runs out of
/// sleeps, signalling `idle`.
pub struct JumpClock {
    now: AtomicI64,
    remaining: AtomicUsize,
    pub idle: Notify,
}

impl JumpClock {
    pub fn new(now: DateTime<Utc>, sleeps: usize) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now.timestamp()),
            remaining: AtomicUsize::new(sleeps),
            idle: Notify::new(),
        })
    }

    pub fn allow(&self, sleeps: usize) {
        self.remaining.store(sleeps, Ordering::SeqCst);
    }
}

impl Clock for JumpClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now.load(Ordering::SeqCst), 0).expect("timestamp")
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        let proceed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if proceed {
            let secs = i64::try_from(duration.as_secs()).expect("duration");
            self.now.fetch_add(secs, Ordering::SeqCst);
        } else {
            self.idle.notify_one();
        }
        async move {
            if !proceed {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Timelock stand-in keyed on whole minutes since the epoch. Ciphertexts are
/// `<minute>:<hex plaintext>`.
pub struct MinuteTimelock {
    pub clock: Arc<JumpClock>,
}

impl TimelockProvider for MinuteTimelock {
    fn round_for(&self, instant: DateTime<Utc>) -> ReleaseId {
        ReleaseId::new(u64::try_from(instant.timestamp() / 60).expect("after epoch"))
    }

    fn encrypt(&self, release: ReleaseId, plaintext: &[u8]) -> VaultResult<Ciphertext> {
        Ok(Ciphertext::new(format!("{release}:{}", hex::encode(plaintext))))
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> VaultResult<Zeroizing<Vec<u8>>> {
        let malformed = || VaultError::MalformedCiphertext("not a minute lock".to_string());
        let (round, body) = ciphertext.as_str().split_once(':').ok_or_else(malformed)?;
        let round: u64 = round.parse().map_err(|_| malformed())?;
        if round > self.round_for(self.clock.now()).round() {
            return Err(VaultError::NotYetAvailable { round });
        }
        hex::decode(body).map(Zeroizing::new).map_err(|_| malformed())
    }
}

pub fn utc_policy() -> SchedulePolicy {
    SchedulePolicy {
        zone: ReleaseZone::Utc,
        ..SchedulePolicy::default()
    }
}
