//! The wallet facade.
//!
//! [`Wallet`] composes the keyring, output cache, synchronizer, transaction
//! builder, and event bus behind the public wallet surface: sync, balances,
//! addresses, daemon status, transaction creation and relay, and listener
//! registration.

use std::fmt;
use std::sync::Arc;

use umbra_core::address::{Address, Network};
use umbra_core::types::Hash256;
use umbra_daemon::{DaemonClient, HttpDaemonClient, RpcConnection};

use crate::builder::{TransactionSet, TxBuilder};
use crate::config::{TxConfig, WalletConfig};
use crate::error::WalletError;
use crate::events::{EventBus, ListenerId, WalletEvent};
use crate::keyring::KeyRing;
use crate::keystore::{self, KeystoreData};
use crate::outputs::OutputCache;
use crate::sync::{SyncOptions, SyncState, Synchronizer};

/// A daemon-backed wallet.
///
/// Construction consumes a [`WalletConfig`]; afterwards the wallet is
/// driven through this facade. The blocking [`sync`](Self::sync) call is
/// designed to run on a caller-provided worker thread, with
/// [`cancel_sync`](Self::cancel_sync) for cooperative shutdown.
pub struct Wallet {
    network: Network,
    connection: RpcConnection,
    keyring: Arc<KeyRing>,
    cache: Arc<OutputCache>,
    daemon: Arc<dyn DaemonClient>,
    events: Arc<EventBus>,
    synchronizer: Synchronizer,
    builder: TxBuilder,
}

impl Wallet {
    /// Open a wallet against the daemon endpoint named in the config.
    pub fn connect(config: WalletConfig) -> Result<Self, WalletError> {
        let daemon = Arc::new(HttpDaemonClient::new(config.daemon.clone())?);
        Self::open(config, daemon)
    }

    /// Open a wallet with an externally constructed daemon client.
    ///
    /// With a non-empty keystore path, an existing file wins over the
    /// config's seed (the file is the wallet identity); a missing file is
    /// created from the config. An empty path keeps the wallet in memory.
    pub fn open(config: WalletConfig, daemon: Arc<dyn DaemonClient>) -> Result<Self, WalletError> {
        let persist = !config.path.as_os_str().is_empty();

        let (mnemonic, restore_height) = if persist && config.path.exists() {
            let data = keystore::load(&config.path, config.password.as_bytes())?;
            if data.network != config.network {
                return Err(WalletError::Config(format!(
                    "keystore is a {} wallet, config says {}",
                    data.network, config.network
                )));
            }
            (data.mnemonic, data.restore_height)
        } else {
            (config.seed.clone(), config.restore_height)
        };

        let keyring = Arc::new(KeyRing::derive(&mnemonic, config.network)?);

        if persist && !config.path.exists() {
            keystore::save(
                &config.path,
                config.password.as_bytes(),
                &KeystoreData {
                    mnemonic,
                    network: config.network,
                    restore_height,
                },
            )?;
        }

        let cache = Arc::new(OutputCache::new());
        let events = Arc::new(EventBus::new());
        let synchronizer = Synchronizer::new(
            Arc::clone(&daemon),
            Arc::clone(&cache),
            Arc::clone(&keyring),
            Arc::clone(&events),
            restore_height,
            SyncOptions::default(),
        );

        Ok(Self {
            network: config.network,
            connection: config.daemon,
            keyring,
            cache,
            daemon,
            events,
            synchronizer,
            builder: TxBuilder::new(),
        })
    }

    /// Synchronize with the daemon. Blocks until the wallet is caught up,
    /// the pass is cancelled, or an unrecoverable daemon failure occurs.
    pub fn sync(&self) -> Result<(), WalletError> {
        self.synchronizer.sync()
    }

    /// Ask an in-flight sync to stop cleanly between blocks.
    pub fn cancel_sync(&self) {
        self.synchronizer.cancel()
    }

    /// Total balance of an account, in motes.
    pub fn get_balance(&self, account_index: u32) -> u64 {
        self.cache.balance(account_index)
    }

    /// Unlocked balance of an account at the current wallet height.
    pub fn get_unlocked_balance(&self, account_index: u32) -> u64 {
        self.cache
            .unlocked_balance(account_index, self.get_height())
    }

    /// The wallet's primary address.
    pub fn get_primary_address(&self) -> Address {
        self.keyring.primary_address()
    }

    /// The address of an account/subaddress slot.
    pub fn get_address(&self, account_index: u32, subaddress_index: u32) -> Address {
        self.keyring.address_for(account_index, subaddress_index)
    }

    /// Height the wallet has scanned to.
    pub fn get_height(&self) -> u64 {
        self.synchronizer.state().wallet_height
    }

    /// Last observed daemon tip height.
    pub fn get_daemon_height(&self) -> u64 {
        self.synchronizer.state().daemon_height
    }

    /// Whether the last daemon probe succeeded.
    pub fn is_connected_to_daemon(&self) -> bool {
        self.synchronizer.state().is_connected
    }

    /// The daemon endpoint this wallet was configured with.
    pub fn get_daemon_connection(&self) -> &RpcConnection {
        &self.connection
    }

    /// Whether the daemon reported itself synchronized.
    pub fn is_daemon_synced(&self) -> bool {
        self.synchronizer.state().is_daemon_synced
    }

    /// Whether the daemon reported itself trusted.
    pub fn is_daemon_trusted(&self) -> bool {
        self.synchronizer.state().is_daemon_trusted
    }

    /// Full sync state snapshot.
    pub fn sync_state(&self) -> SyncState {
        self.synchronizer.state()
    }

    /// Build (and, if the config says so, relay) a transaction.
    pub fn create_tx(&self, config: &TxConfig) -> Result<TransactionSet, WalletError> {
        let tx_set = self
            .builder
            .build(config, &self.keyring, &self.cache, self.get_height())?;
        if config.relay {
            self.relay_tx(&tx_set)?;
        }
        Ok(tx_set)
    }

    /// Relay a previously built transaction.
    ///
    /// On success the consumed outputs become pending spends and a
    /// [`WalletEvent::BalanceChanged`] is emitted for the source account.
    pub fn relay_tx(&self, tx_set: &TransactionSet) -> Result<Hash256, WalletError> {
        let tx_hash = self
            .builder
            .relay(tx_set, &self.cache, self.daemon.as_ref())?;

        let account = tx_set.account;
        self.events.emit(WalletEvent::BalanceChanged {
            account,
            balance: self.cache.balance(account),
            unlocked: self.cache.unlocked_balance(account, self.get_height()),
        });
        Ok(tx_hash)
    }

    /// Register a listener for wallet events. Delivery is queued and never
    /// blocks wallet operations.
    pub fn add_listener(
        &self,
        callback: impl Fn(&WalletEvent) + Send + 'static,
    ) -> ListenerId {
        self.events.subscribe(callback)
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Block until all previously emitted events have been delivered.
    pub fn flush_events(&self) {
        self.events.flush()
    }

    /// The network this wallet operates on.
    pub fn network(&self) -> Network {
        self.network
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &self.network)
            .field("daemon", &self.connection.uri)
            .field("height", &self.get_height())
            .finish_non_exhaustive()
    }
}
