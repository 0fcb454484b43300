//! The [`DaemonClient`] trait and its connection/status value types.

use serde::{Deserialize, Serialize};
use std::fmt;

use umbra_core::types::Block;

use crate::error::DaemonError;

/// Connection settings for a daemon RPC endpoint.
///
/// Immutable value identifying one daemon. Credentials are sent as HTTP
/// basic auth when the username is non-empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConnection {
    /// URI of the daemon (e.g. `http://localhost:38081`).
    pub uri: String,
    /// Username for RPC authentication. Empty disables auth.
    pub username: String,
    /// Password for RPC authentication.
    pub password: String,
}

impl RpcConnection {
    /// Create connection settings without credentials.
    pub fn unauthenticated(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: String::new(),
            password: String::new(),
        }
    }

    /// Create connection settings with basic-auth credentials.
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConnection")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Daemon status snapshot returned by [`DaemonClient::get_info`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonInfo {
    /// Tip block height of the daemon's chain.
    pub height: u64,
    /// Height the daemon itself is syncing towards (== height when synced).
    pub target_height: u64,
    /// Whether the daemon considers itself fully synchronized.
    pub synced: bool,
    /// Whether the daemon is marked as trusted (local or operator-owned).
    pub trusted: bool,
}

/// Blocking client interface to a blockchain daemon.
///
/// All operations may block on network I/O. Implementations must map
/// connection failures and timeouts to [`DaemonError::Unreachable`] and
/// active refusals (e.g. a double-spend on relay) to
/// [`DaemonError::Rejected`].
pub trait DaemonClient: Send + Sync {
    /// Current tip block height of the daemon's chain.
    fn get_height(&self) -> Result<u64, DaemonError>;

    /// Daemon status: height, sync target, synced/trusted flags.
    fn get_info(&self) -> Result<DaemonInfo, DaemonError>;

    /// Fetch up to `max_count` consecutive blocks starting at `from_height`.
    ///
    /// Returns an empty vector when `from_height` is past the tip. The
    /// sequence is restartable from any height, so callers page through the
    /// chain by advancing `from_height` past the last block received.
    fn fetch_blocks(&self, from_height: u64, max_count: usize) -> Result<Vec<Block>, DaemonError>;

    /// Relay a signed transaction (hex-encoded canonical bytes) to the
    /// daemon's peer network.
    fn relay(&self, tx_hex: &str) -> Result<(), DaemonError>;
}
