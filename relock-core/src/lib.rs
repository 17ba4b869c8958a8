//! `relock-core` keeps one secret perpetually locked to a future drand
//! release.
//!
//! A vault is bootstrapped from a 4 digit code and a password. The pair is
//! timelock-encrypted to the next day's release hour and its source files are
//! deleted. From then on the [`Scheduler`] waits for each release, decrypts
//! the artifact and immediately locks the secret again to the following day.
//! If the process stops, the last artifact opens on its own once its release
//! is public.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod bootstrap;
pub use bootstrap::{resolve, Mode};

pub mod config;
pub use config::{DrandConfig, ReleaseZone, SchedulePolicy};

pub mod credentials;
pub use credentials::CredentialPair;

mod error;
pub use error::{VaultError, VaultResult};

pub mod lock;
pub use lock::VaultLock;

pub mod paths;
pub use paths::VaultPaths;

pub mod schedule;
pub use schedule::{Clock, SystemClock};

mod scheduler;
pub use scheduler::Scheduler;

pub mod store;

pub mod timelock;
pub use timelock::{Ciphertext, DrandTimelock, ReleaseId, TimelockProvider};

#[cfg(test)]
mod tests_utils;
