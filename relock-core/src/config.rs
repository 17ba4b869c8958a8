//! Runtime configuration for the scheduler and the beacon client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// drand mainnet "quicknet" chain, the default chain for tlock clients.
pub const QUICKNET_CHAIN_HASH: &str =
    "52db9ba70e0cc0f6eaf7803dd07447a1f5477735fd3f661792ba94600c84e971";

/// Public drand HTTP relay.
pub const DEFAULT_DRAND_URL: &str = "https://api.drand.sh";

/// Time zone the daily release hour is interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseZone {
    /// The host's local time zone.
    #[default]
    Local,
    /// UTC, independent of the host configuration.
    Utc,
}

impl FromStr for ReleaseZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(format!("unknown release zone '{other}' (expected 'local' or 'utc')")),
        }
    }
}

impl fmt::Display for ReleaseZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
        }
    }
}

/// When releases are scheduled and how the rolling loop waits for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Hour of day (0-23) every activation instant is normalized to.
    pub release_hour: u32,
    /// Zone `release_hour` is read in.
    pub zone: ReleaseZone,
    /// Extra time slept past the activation instant before decrypting.
    pub wake_margin: Duration,
    /// Tolerated disagreement between the local clock and the beacon.
    pub skew_tolerance: Duration,
    /// First delay before retrying a deferred roll.
    pub retry_min_delay: Duration,
    /// Upper bound for the retry delay.
    pub retry_max_delay: Duration,
    /// Consecutive deferred rolls after which the outage is reported as a
    /// warning.
    pub alert_after: u32,
}

impl SchedulePolicy {
    /// Remaining time above which the loop sleeps instead of decrypting.
    #[must_use]
    pub fn sleep_threshold(&self) -> Duration {
        self.wake_margin.saturating_add(self.skew_tolerance)
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            release_hour: 5,
            zone: ReleaseZone::Local,
            wake_margin: Duration::from_secs(60),
            skew_tolerance: Duration::from_secs(10),
            retry_min_delay: Duration::from_secs(30),
            retry_max_delay: Duration::from_secs(15 * 60),
            alert_after: 5,
        }
    }
}

/// Where and how to reach the drand beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrandConfig {
    /// Base URL of a drand HTTP relay.
    pub base_url: String,
    /// Hex hash of the chain to lock against.
    pub chain_hash: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retries for transient failures (total attempts = retries + 1).
    pub max_retries: u32,
    /// Smallest delay between retries.
    pub retry_min_delay: Duration,
}

impl Default for DrandConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DRAND_URL.to_string(),
            chain_hash: QUICKNET_CHAIN_HASH.to_string(),
            request_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_min_delay: Duration::from_millis(200),
        }
    }
}
