//! # umbra-wallet — the Umbra wallet engine.
//!
//! Composes deterministic key derivation, daemon synchronization, output
//! tracking, transaction construction, and event delivery behind the
//! [`Wallet`] facade.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` and the sync/cache sub-errors
//! - [`mnemonic`] — BIP-39 phrase ↔ entropy conversion
//! - [`keyring`] — spend/view secrets and subaddress derivation
//! - [`outputs`] — owned-output cache with balances and reservations
//! - [`sync`] — incremental chain synchronizer with reorg handling
//! - [`builder`] — transaction construction, signing, and relay
//! - [`events`] — listener registry with queued, ordered delivery
//! - [`keystore`] — encrypted wallet file persistence
//! - [`config`] — wallet and transaction configuration
//! - [`wallet`] — the public facade

pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod keyring;
pub mod keystore;
pub mod mnemonic;
pub mod outputs;
pub mod sync;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{TransactionSet, TxBuilder};
pub use config::{Destination, TxConfig, WalletConfig};
pub use error::{CacheError, SyncError, WalletError};
pub use events::{EventBus, ListenerId, WalletEvent};
pub use keyring::{Entropy, KeyRing, SubaddressIndex};
pub use outputs::{OutputCache, OutputStatus, OwnedOutput, ReservationId};
pub use sync::{SyncOptions, SyncPhase, SyncState, Synchronizer};
pub use wallet::Wallet;
