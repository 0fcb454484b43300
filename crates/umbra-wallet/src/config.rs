//! Wallet and transaction configuration.
//!
//! These structs are the engine's sole external configuration surface:
//! [`WalletConfig`] is consumed once when a wallet is opened, [`TxConfig`]
//! parameterizes one transaction build.

use std::path::PathBuf;

use umbra_core::address::{Address, Network};
use umbra_daemon::RpcConnection;

/// One transaction destination: address and amount in motes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    /// Receiving address.
    pub address: Address,
    /// Amount in motes. Must be strictly positive.
    pub amount: u64,
}

impl Destination {
    /// Create a destination.
    pub fn new(address: Address, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// Configuration for building one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxConfig {
    /// Ordered list of destinations. Must be non-empty.
    pub destinations: Vec<Destination>,
    /// Account whose outputs fund the transaction.
    pub account_index: u32,
    /// Whether to relay immediately after building.
    pub relay: bool,
}

impl TxConfig {
    /// Create a config paying the given destinations from account 0,
    /// without immediate relay.
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self {
            destinations,
            account_index: 0,
            relay: false,
        }
    }

    /// Create a config with a single destination.
    pub fn single(address: Address, amount: u64) -> Self {
        Self::new(vec![Destination::new(address, amount)])
    }

    /// Fund the transaction from a specific account.
    pub fn from_account(mut self, account_index: u32) -> Self {
        self.account_index = account_index;
        self
    }

    /// Relay immediately after building.
    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Sum of destination amounts, None on overflow.
    pub fn total_amount(&self) -> Option<u64> {
        self.destinations
            .iter()
            .try_fold(0u64, |acc, d| acc.checked_add(d.amount))
    }
}

/// Configuration for opening a wallet. Consumed once at construction.
#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// 24-word mnemonic seed phrase.
    pub seed: String,
    /// Keystore file path. Empty for a purely in-memory wallet.
    pub path: PathBuf,
    /// Keystore password.
    pub password: String,
    /// Network the wallet operates on.
    pub network: Network,
    /// Daemon endpoint to sync against.
    pub daemon: RpcConnection,
    /// Block height to start scanning from when no keystore exists yet.
    pub restore_height: u64,
}

impl WalletConfig {
    /// Create a config with an in-memory keystore and restore height 0.
    pub fn new(seed: impl Into<String>, network: Network, daemon: RpcConnection) -> Self {
        Self {
            seed: seed.into(),
            path: PathBuf::new(),
            password: String::new(),
            network,
            daemon,
            restore_height: 0,
        }
    }

    /// Persist the keystore at the given path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Protect the keystore with a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Start scanning from the given height.
    pub fn with_restore_height(mut self, restore_height: u64) -> Self {
        self.restore_height = restore_height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::address::AddressKind;
    use umbra_core::types::Hash256;

    fn addr(byte: u8) -> Address {
        Address::new(Hash256([byte; 32]), AddressKind::Primary, Network::Testnet)
    }

    #[test]
    fn tx_config_defaults() {
        let config = TxConfig::single(addr(1), 500);
        assert_eq!(config.destinations.len(), 1);
        assert_eq!(config.account_index, 0);
        assert!(!config.relay);
    }

    #[test]
    fn tx_config_builders() {
        let config = TxConfig::single(addr(1), 500)
            .from_account(3)
            .with_relay(true);
        assert_eq!(config.account_index, 3);
        assert!(config.relay);
    }

    #[test]
    fn total_amount_sums() {
        let config = TxConfig::new(vec![
            Destination::new(addr(1), 300),
            Destination::new(addr(2), 200),
        ]);
        assert_eq!(config.total_amount(), Some(500));
    }

    #[test]
    fn total_amount_overflow_is_none() {
        let config = TxConfig::new(vec![
            Destination::new(addr(1), u64::MAX),
            Destination::new(addr(2), 1),
        ]);
        assert_eq!(config.total_amount(), None);
    }

    #[test]
    fn wallet_config_builders() {
        let config = WalletConfig::new(
            "seed words here",
            Network::Stagenet,
            RpcConnection::unauthenticated("http://localhost:38081"),
        )
        .with_path("/tmp/wallet.umb")
        .with_password("secret")
        .with_restore_height(1000);

        assert_eq!(config.network, Network::Stagenet);
        assert_eq!(config.path, PathBuf::from("/tmp/wallet.umb"));
        assert_eq!(config.password, "secret");
        assert_eq!(config.restore_height, 1000);
    }

    #[test]
    fn wallet_config_defaults_to_in_memory() {
        let config = WalletConfig::new(
            "seed",
            Network::Testnet,
            RpcConnection::unauthenticated("http://localhost:38081"),
        );
        assert!(config.path.as_os_str().is_empty());
        assert_eq!(config.restore_height, 0);
    }
}
