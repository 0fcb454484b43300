//! Daemon error types.

use thiserror::Error;

/// Errors surfaced by daemon RPC operations.
///
/// The central distinction is transient vs. terminal: [`Unreachable`]
/// failures (connect errors, timeouts) may succeed on retry, while
/// [`Rejected`] means the daemon received the request and refused it, so
/// retrying the same request will not help.
///
/// [`Unreachable`]: DaemonError::Unreachable
/// [`Rejected`]: DaemonError::Rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// The daemon could not be reached: connection refused, DNS failure,
    /// or request timeout. Transient.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon actively refused the request (e.g. a double-spend on
    /// relay). Terminal for this attempt.
    #[error("daemon rejected request: {0}")]
    Rejected(String),

    /// The daemon answered with a payload the client could not decode.
    #[error("invalid daemon response: {0}")]
    InvalidResponse(String),

    /// The configured daemon URI is not a valid URL.
    #[error("invalid daemon uri: {0}")]
    InvalidUri(String),
}

impl DaemonError {
    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DaemonError::Unreachable(_))
    }
}
