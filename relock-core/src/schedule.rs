//! Activation instants and the clock the scheduler runs on.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};

use crate::config::{ReleaseZone, SchedulePolicy};

/// Source of the current time and of suspension.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Picks the activation instant for a lock written at `now`.
///
/// The instant is one day ahead of `now`, normalized to the policy's release
/// hour. It is pushed further by whole days until it is at least the
/// policy's sleep threshold ahead of `now` and strictly later than
/// `previous`.
#[must_use]
pub fn next_activation(
    now: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
    policy: &SchedulePolicy,
) -> DateTime<Utc> {
    let lead = TimeDelta::from_std(policy.sleep_threshold()).unwrap_or_else(|_| TimeDelta::zero());
    let earliest = now + lead;
    let mut candidate = release_after(now, policy);
    while candidate < earliest || previous.is_some_and(|previous| candidate <= previous) {
        candidate = release_after(candidate, policy);
    }
    candidate
}

/// Release hour on the calendar day after `instant`. Always later than
/// `instant`.
fn release_after(instant: DateTime<Utc>, policy: &SchedulePolicy) -> DateTime<Utc> {
    let tomorrow = instant + TimeDelta::days(1);
    let normalized = match policy.zone {
        ReleaseZone::Utc => at_hour(&tomorrow, policy.release_hour),
        ReleaseZone::Local => at_hour(&tomorrow.with_timezone(&Local), policy.release_hour),
    };
    normalized.unwrap_or(tomorrow)
}

fn at_hour<Tz: TimeZone>(instant: &DateTime<Tz>, hour: u32) -> Option<DateTime<Utc>> {
    let zone = instant.timezone();
    let date = instant.date_naive();
    // A DST gap can swallow the hour; take the first hour that exists.
    (0..3)
        .find_map(|shift| {
            let naive = date.and_hms_opt(hour + shift, 0, 0)?;
            zone.from_local_datetime(&naive).earliest()
        })
        .map(|normalized| normalized.with_timezone(&Utc))
}

/// How long to sleep before decrypting an artifact that activates at
/// `activation`, or `None` if it is due now.
#[must_use]
pub fn wake_delay(
    activation: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &SchedulePolicy,
) -> Option<Duration> {
    let remaining = (activation - now).to_std().ok()?;
    (remaining > policy.sleep_threshold()).then(|| remaining.saturating_add(policy.wake_margin))
}
