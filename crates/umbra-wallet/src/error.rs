//! Wallet error types.
//!
//! The taxonomy distinguishes three classes the caller must treat
//! differently: validation errors (surface immediately, nothing changed),
//! transient daemon failures (retryable by the caller), and programming
//! errors against the output cache (the specific operation aborts, shared
//! state stays intact).

use thiserror::Error;

use umbra_core::types::OutPoint;
use umbra_daemon::DaemonError;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed mnemonic phrase or checksum failure.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// A transaction config with no destinations.
    #[error("no destinations")]
    EmptyDestinations,

    /// Invalid monetary amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed destination address or network-type mismatch.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Insufficient unlocked funds to cover the destinations plus fee.
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        /// Spendable balance in motes.
        available: u64,
        /// Required amount (destinations + fee) in motes.
        required: u64,
    },

    /// Signing failed: key unavailable or a construction invariant was
    /// violated. Fatal, not retried.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Daemon RPC failure. `Unreachable` variants are retryable by the
    /// caller; `Rejected` means state was rolled back.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Synchronization failure (exhausted retries, deep reorg).
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Output cache misuse (double reservation, unknown token). Programming
    /// error: the operation aborted without corrupting shared state.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Wrong password for the wallet keystore.
    #[error("invalid password")]
    InvalidPassword,

    /// Keystore file is corrupted or has an unsupported format.
    #[error("corrupted wallet file: {0}")]
    CorruptedFile(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Invalid wallet configuration.
    #[error("configuration: {0}")]
    Config(String),
}

impl WalletError {
    /// Whether the caller may retry the failed operation unchanged.
    ///
    /// True only for transient daemon connectivity failures; everything
    /// else either already rolled back or requires a different request.
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletError::Daemon(e) => e.is_transient(),
            WalletError::Sync(SyncError::DaemonUnreachable { .. }) => true,
            _ => false,
        }
    }
}

/// Errors from the synchronizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The daemon stayed unreachable past the retry budget.
    #[error("daemon unreachable after {attempts} attempts: {source}")]
    DaemonUnreachable {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The last transport failure.
        source: DaemonError,
    },

    /// A non-transient daemon failure during a sync operation.
    #[error("daemon failure during {operation}: {source}")]
    Daemon {
        /// The RPC that failed.
        operation: &'static str,
        /// The daemon's error.
        source: DaemonError,
    },

    /// The chain reorganized deeper than the local checkpoint window.
    #[error("chain reorganization deeper than {window} blocks")]
    ReorgTooDeep {
        /// Size of the checkpoint window that was exhausted.
        window: usize,
    },
}

/// Output cache misuse. These are programming errors, not runtime
/// conditions: the failing operation is aborted and the cache unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The outpoint is not tracked by the cache.
    #[error("unknown output: {0}")]
    UnknownOutput(OutPoint),

    /// The output is already reserved by another in-flight build.
    #[error("output already reserved: {0}")]
    AlreadyReserved(OutPoint),

    /// The output is already spent or pending spend.
    #[error("output already spent: {0}")]
    AlreadySpent(OutPoint),

    /// No reservation with this token exists (released, committed, or never
    /// issued).
    #[error("unknown reservation: {0}")]
    UnknownReservation(u64),
}
