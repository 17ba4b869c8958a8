//! Error types for the rolling vault.

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors raised while bootstrapping, persisting or rolling the vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A bootstrap input file exists but its content is malformed.
    #[error("invalid bootstrap input '{file}': {reason}")]
    InvalidBootstrapFormat {
        /// Name of the offending file.
        file: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Only one half of the credential pair was provided.
    #[error(
        "inconsistent bootstrap state: '{present}' exists but '{missing}' does not; provide both or neither"
    )]
    InconsistentBootstrapState {
        /// The bootstrap file that was found.
        present: String,
        /// The bootstrap file that was expected alongside it.
        missing: String,
    },

    /// Neither bootstrap inputs nor a locked artifact are available.
    #[error("no valid mode: provide a code and password file pair, or an existing locked artifact")]
    NoValidMode,

    /// The persisted artifact exists but cannot be parsed.
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// The rolling loop found no artifact to roll.
    #[error("locked artifact is missing")]
    MissingArtifact,

    /// The release the ciphertext is bound to has not been published yet.
    #[error("release {round} is not yet available")]
    NotYetAvailable {
        /// Beacon round the ciphertext is bound to.
        round: u64,
    },

    /// The ciphertext could not be decoded or opened.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Transient failure talking to the randomness beacon.
    #[error("network error at {url} (status {status:?}): {error}")]
    Network {
        /// URL of the failed request.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Error description.
        error: String,
    },

    /// The beacon answered with something unusable.
    #[error("beacon error: {0}")]
    Beacon(String),

    /// An I/O operation failed.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another process already holds the vault lock.
    #[error("another relock process is already running on this data directory")]
    AlreadyRunning,

    /// The vault lock could not be acquired or released.
    #[error("vault lock error: {0}")]
    Lock(String),
}

impl VaultError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for failures the rolling loop recovers from by trying
    /// again later with the current artifact left untouched.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NotYetAvailable { .. } | Self::Network { .. })
    }

    /// Process exit status used when this error terminates the runner.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidBootstrapFormat { .. } => 2,
            Self::InconsistentBootstrapState { .. } => 3,
            Self::NoValidMode => 4,
            Self::CorruptArtifact(_) => 5,
            Self::MissingArtifact => 6,
            Self::AlreadyRunning => 7,
            _ => 1,
        }
    }
}
