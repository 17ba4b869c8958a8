//! Test doubles for the clock, the timelock provider and log output.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Notify;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};
use crate::schedule::Clock;
use crate::timelock::{Ciphertext, ReleaseId, TimelockProvider};

/// Clock whose sleeps complete instantly by advancing time.
///
/// After `budget` sleeps every further sleep hangs and `exhausted()` fires,
/// which tests use as the scheduler's shutdown signal.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
    budget: Mutex<usize>,
    exhausted: Notify,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, budget: usize) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
            budget: Mutex::new(budget),
            exhausted: Notify::new(),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Every sleep requested so far, including the one that hung.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn exhausted(&self) -> impl Future<Output = ()> + '_ {
        self.exhausted.notified()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.sleeps.lock().unwrap().push(duration);
        let proceed = {
            let mut budget = self.budget.lock().unwrap();
            if *budget > 0 {
                *budget -= 1;
                true
            } else {
                false
            }
        };
        if proceed {
            let mut now = self.now.lock().unwrap();
            *now += TimeDelta::from_std(duration).unwrap();
        } else {
            self.exhausted.notify_one();
        }
        async move {
            if !proceed {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Timelock stand-in with three second rounds starting at the Unix epoch.
///
/// A ciphertext is `<round>.<hex plaintext>` and opens once the shared clock
/// has reached the round.
pub struct FakeTimelock {
    clock: Arc<ManualClock>,
    failures: AtomicU32,
    decrypt_calls: AtomicUsize,
}

impl FakeTimelock {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            failures: AtomicU32::new(0),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` decrypt calls fail with a network error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl TimelockProvider for FakeTimelock {
    fn round_for(&self, instant: DateTime<Utc>) -> ReleaseId {
        ReleaseId::new(u64::try_from(instant.timestamp()).unwrap() / 3 + 1)
    }

    fn encrypt(&self, release: ReleaseId, plaintext: &[u8]) -> VaultResult<Ciphertext> {
        Ok(Ciphertext::new(format!("{release}.{}", hex::encode(plaintext))))
    }

    async fn decrypt(&self, ciphertext: &Ciphertext) -> VaultResult<Zeroizing<Vec<u8>>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(VaultError::Network {
                url: "fake://beacon".to_string(),
                status: Some(503),
                error: "injected failure".to_string(),
            });
        }

        let malformed = || VaultError::MalformedCiphertext(ciphertext.as_str().to_string());
        let (round, body) = ciphertext.as_str().split_once('.').ok_or_else(malformed)?;
        let round: u64 = round.parse().map_err(|_| malformed())?;
        if round > self.round_for(self.clock.now()).round() {
            return Err(VaultError::NotYetAvailable { round });
        }
        hex::decode(body).map(Zeroizing::new).map_err(|_| malformed())
    }
}

/// In-memory sink for `tracing` output.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Routes this thread's events here until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
