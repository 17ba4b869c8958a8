#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use common::{utc_policy, JumpClock, MinuteTimelock};
use relock_core::paths::{ARTIFACT_FILENAME, CODE_FILENAME, PASSWORD_FILENAME};
use relock_core::store::{ArtifactStore, AtomicBlobStore, FsBlobStore, LockedArtifact};
use relock_core::{resolve, Clock, Mode, Scheduler, TimelockProvider, VaultError};
use test_case::test_case;

fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
}

fn on_disk(dir: &std::path::Path) -> LockedArtifact {
    let text = std::fs::read_to_string(dir.join(ARTIFACT_FILENAME)).expect("artifact file");
    LockedArtifact::parse(&text).expect("parse artifact")
}

/// Reads the plaintext straight out of a `MinuteTimelock` ciphertext.
fn peek(artifact: &LockedArtifact) -> String {
    let (_, body) = artifact.ciphertext.as_str().split_once(':').expect("minute lock");
    String::from_utf8(hex::decode(body).expect("hex")).expect("utf8")
}

fn scheduler(
    blobs: &Arc<FsBlobStore>,
    clock: &Arc<JumpClock>,
) -> Scheduler<MinuteTimelock, Arc<JumpClock>> {
    Scheduler::new(
        MinuteTimelock {
            clock: clock.clone(),
        },
        ArtifactStore::new(blobs.clone()),
        clock.clone(),
        utc_policy(),
    )
}

#[tokio::test]
async fn test_bootstrap_roll_and_resume_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(CODE_FILENAME), "1234\n").expect("write code");
    std::fs::write(dir.path().join(PASSWORD_FILENAME), "hunter2\n").expect("write password");

    let blobs = Arc::new(FsBlobStore::new(dir.path()).expect("store"));
    let clock = JumpClock::new(at(2026, 10, 19, 12), 1);

    let mode = resolve(blobs.as_ref()).expect("resolve");
    assert!(matches!(mode, Mode::Bootstrap(_)));
    scheduler(&blobs, &clock)
        .run(mode, clock.idle.notified())
        .await
        .expect("first run");

    assert!(!dir.path().join(CODE_FILENAME).exists());
    assert!(!dir.path().join(PASSWORD_FILENAME).exists());
    let first = on_disk(dir.path());
    assert_eq!(first.activation, at(2026, 10, 21, 5));
    assert_eq!(peek(&first), "1234:hunter2");

    // A restarted process picks the artifact up and keeps rolling.
    clock.allow(1);
    let mode = resolve(blobs.as_ref()).expect("resolve");
    assert!(matches!(mode, Mode::Resume));
    scheduler(&blobs, &clock)
        .run(mode, clock.idle.notified())
        .await
        .expect("second run");

    let second = on_disk(dir.path());
    assert_eq!(second.activation, at(2026, 10, 22, 5));
    assert_eq!(peek(&second), "1234:hunter2");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from(ARTIFACT_FILENAME)]);
}

#[tokio::test]
async fn test_premature_decrypt_leaves_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(FsBlobStore::new(dir.path()).expect("store"));
    let clock = JumpClock::new(at(2026, 10, 19, 12), 0);
    let provider = MinuteTimelock {
        clock: clock.clone(),
    };

    let activation = clock.now() + TimeDelta::hours(1);
    let artifact = LockedArtifact::new(
        provider
            .encrypt(provider.round_for(activation), b"1234:hunter2")
            .expect("encrypt"),
        activation,
    );
    ArtifactStore::new(blobs.clone()).save(&artifact).expect("save");
    let before = std::fs::read(dir.path().join(ARTIFACT_FILENAME)).expect("read");

    match provider.decrypt(&artifact.ciphertext).await {
        Err(VaultError::NotYetAvailable { .. }) => {}
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
    match scheduler(&blobs, &clock).roll(&artifact).await {
        Err(VaultError::NotYetAvailable { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(std::fs::read(dir.path().join(ARTIFACT_FILENAME)).expect("read"), before);
}

#[test_case("hunter2", "1234:hunter2" ; "plain")]
#[test_case("pa:ss:word", "1234:pa:ss:word" ; "separator inside password")]
#[test_case("  spaced out  ", "1234:spaced out" ; "trimmed password")]
#[test_case("pässwörd", "1234:pässwörd" ; "non ascii password")]
#[tokio::test]
async fn test_round_trip_reproduces_payload(password: &str, expected: &str) {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(FsBlobStore::new(dir.path()).expect("store"));
    blobs.write_atomic(CODE_FILENAME, b"1234").expect("write");
    blobs
        .write_atomic(PASSWORD_FILENAME, password.as_bytes())
        .expect("write");
    let clock = JumpClock::new(at(2026, 3, 1, 18), 1);

    let Mode::Bootstrap(credentials) = resolve(blobs.as_ref()).expect("resolve") else {
        panic!("expected bootstrap");
    };
    let locked = scheduler(&blobs, &clock)
        .lock_credentials(credentials)
        .expect("lock");
    assert_eq!(peek(&locked), expected);
}

#[test]
fn test_empty_data_dir_has_no_valid_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs = FsBlobStore::new(dir.path()).expect("store");
    assert!(matches!(resolve(&blobs), Err(VaultError::NoValidMode)));

    blobs.write_atomic(ARTIFACT_FILENAME, b"  \n").expect("write");
    assert!(matches!(resolve(&blobs), Err(VaultError::NoValidMode)));
}
