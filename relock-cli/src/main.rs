//! `relock`: runs a rolling timelock vault over a data directory.
//!
//! Put `pin.txt` and `password.txt` in the data directory and start `relock`.
//! The pair is locked to the next release and the files are deleted. Leave it
//! running to keep the lock rolling forward; stop it and the secret opens once
//! the last release is public.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use relock_core::config::{DEFAULT_DRAND_URL, QUICKNET_CHAIN_HASH};
use relock_core::store::{ArtifactStore, FsBlobStore};
use relock_core::{
    resolve, DrandConfig, DrandTimelock, Mode, ReleaseZone, SchedulePolicy, Scheduler,
    SystemClock, VaultError, VaultLock, VaultPaths,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound for the wake margin and skew tolerance flags.
const MAX_MARGIN_SECS: u64 = 3600;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rolling timelock vault")]
struct Cli {
    /// Directory holding the bootstrap inputs and the locked artifact.
    #[arg(long, env = "RELOCK_DATA_DIR", value_name = "PATH", default_value = ".")]
    data_dir: PathBuf,

    /// Base URL of a drand HTTP relay.
    #[arg(long, env = "RELOCK_DRAND_URL", value_name = "URL", default_value = DEFAULT_DRAND_URL)]
    drand_url: String,

    /// Hex hash of the drand chain to lock against.
    #[arg(long, env = "RELOCK_CHAIN_HASH", value_name = "HEX", default_value = QUICKNET_CHAIN_HASH)]
    chain_hash: String,

    /// Hour of day (0-23) each lock is released at.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(0..=23))]
    release_hour: u32,

    /// Time zone the release hour is read in (`local` or `utc`).
    #[arg(long, default_value_t = ReleaseZone::Local)]
    zone: ReleaseZone,

    /// Seconds to sleep past a release before decrypting (at most an hour).
    #[arg(long, value_name = "SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(0..=MAX_MARGIN_SECS))]
    wake_margin_secs: u64,

    /// Tolerated clock disagreement with the beacon, in seconds (at most an hour).
    #[arg(long, value_name = "SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(0..=MAX_MARGIN_SECS))]
    skew_tolerance_secs: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Lock any bootstrap inputs, then keep rolling until interrupted (default).
    Run,
    /// Print what the next run would do and when the current lock opens.
    Status,
}

impl Cli {
    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            release_hour: self.release_hour,
            zone: self.zone,
            wake_margin: Duration::from_secs(self.wake_margin_secs),
            skew_tolerance: Duration::from_secs(self.skew_tolerance_secs),
            ..SchedulePolicy::default()
        }
    }

    fn drand(&self) -> DrandConfig {
        DrandConfig {
            base_url: self.drand_url.clone(),
            chain_hash: self.chain_hash.clone(),
            ..DrandConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cli).await,
        Command::Status => status(&cli.data_dir).map(|summary| println!("{summary}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("Error: {report:?}");
            ExitCode::from(exit_code(&report))
        }
    }
}

async fn run(cli: &Cli) -> eyre::Result<()> {
    let paths = VaultPaths::new(&cli.data_dir);
    let _lock = VaultLock::acquire(&paths.lock_path())
        .wrap_err_with(|| format!("locking {}", paths.data_dir().display()))?;
    let blobs = Arc::new(
        FsBlobStore::new(paths.data_dir()).wrap_err("opening the data directory")?,
    );

    let mode = resolve(blobs.as_ref())?;
    match &mode {
        Mode::Bootstrap(_) => info!(data_dir = %paths.data_dir().display(), "bootstrapping from fresh credentials"),
        Mode::Resume => info!(data_dir = %paths.data_dir().display(), "resuming existing artifact"),
    }

    let provider = DrandTimelock::connect(&cli.drand())
        .await
        .wrap_err("connecting to the drand relay")?;
    let scheduler = Scheduler::new(provider, ArtifactStore::new(blobs), SystemClock, cli.policy());
    scheduler.run(mode, shutdown_signal()).await?;
    info!("stopped");
    Ok(())
}

fn status(data_dir: &Path) -> eyre::Result<String> {
    let paths = VaultPaths::new(data_dir);
    let blobs = Arc::new(
        FsBlobStore::open_existing(paths.data_dir()).wrap_err("opening the data directory")?,
    );
    let summary = match resolve(blobs.as_ref())? {
        Mode::Bootstrap(_) => "bootstrap inputs present; the next run locks them".to_string(),
        Mode::Resume => {
            let artifact = ArtifactStore::new(blobs)
                .load()?
                .ok_or(VaultError::MissingArtifact)?;
            format!(
                "locked until {} (artifact {})",
                artifact.activation.to_rfc3339(),
                artifact.ciphertext.fingerprint()
            )
        }
    };
    Ok(summary)
}

fn exit_code(report: &eyre::Report) -> u8 {
    report
        .downcast_ref::<VaultError>()
        .map_or(1, VaultError::exit_code)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
