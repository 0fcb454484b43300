//! Transaction construction, signing, and relay.
//!
//! Building a transaction:
//! 1. Validate the config (non-empty destinations, positive amounts,
//!    network match).
//! 2. Select inputs largest-amount-first from the account's spendable
//!    outputs, recomputing the fee as inputs are added.
//! 3. Reserve the selection atomically so a concurrent build cannot spend
//!    the same outputs.
//! 4. Assemble outputs (destinations + change), sign every input, and
//!    serialize.
//!
//! Any failure after the reservation releases it; a successful build hands
//! the reservation to the returned [`TransactionSet`] so a later relay can
//! commit (success), release (daemon rejected), or keep it (daemon
//! unreachable, retryable).

use std::fmt;
use tracing::{debug, info, warn};

use umbra_core::crypto::sign_transaction_input;
use umbra_core::types::{Hash256, OutPoint, Transaction, TxInput, TxOutput};
use umbra_daemon::{DaemonClient, DaemonError};

use crate::config::TxConfig;
use crate::error::{CacheError, WalletError};
use crate::keyring::KeyRing;
use crate::outputs::{OutputCache, OwnedOutput, ReservationId};

/// Default fee rate in motes per estimated byte.
pub const DEFAULT_FEE_PER_BYTE: u64 = 100;

/// Fixed size estimate for the transaction envelope, in bytes.
pub const TX_BASE_SIZE: usize = 96;

/// Size estimate per input (outpoint + signature + pubkey), in bytes.
pub const TX_INPUT_SIZE: usize = 112;

/// Size estimate per output (value + pubkey hash), in bytes.
pub const TX_OUTPUT_SIZE: usize = 48;

/// Bounded retries when a concurrent build reserves our selection first.
const MAX_RESERVE_ATTEMPTS: u32 = 3;

/// A signed transaction ready for relay.
///
/// Immutable once produced. Carries its reservation so that
/// [`TxBuilder::relay`] can commit or release the consumed outputs.
pub struct TransactionSet {
    /// Hex-encoded canonical transaction bytes.
    pub serialized_hex: String,
    /// Transaction hash.
    pub tx_hash: Hash256,
    /// Fee paid, in motes.
    pub fee: u64,
    pub(crate) reservation: ReservationId,
    pub(crate) account: u32,
}

impl TransactionSet {
    /// Parse the serialized transaction back into its structured form.
    pub fn decode(&self) -> Result<Transaction, WalletError> {
        let bytes = hex::decode(&self.serialized_hex)
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        let (tx, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        Ok(tx)
    }
}

impl fmt::Debug for TransactionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSet")
            .field("tx_hash", &self.tx_hash)
            .field("fee", &self.fee)
            .field("bytes", &(self.serialized_hex.len() / 2))
            .finish_non_exhaustive()
    }
}

/// Builds and relays transactions against an [`OutputCache`].
pub struct TxBuilder {
    fee_per_byte: u64,
}

impl TxBuilder {
    /// Create a builder with the default fee rate.
    pub fn new() -> Self {
        Self {
            fee_per_byte: DEFAULT_FEE_PER_BYTE,
        }
    }

    /// Create a builder with an explicit fee rate (motes per byte).
    pub fn with_fee_per_byte(fee_per_byte: u64) -> Self {
        Self { fee_per_byte }
    }

    /// Fee for a transaction shape, from the size estimate.
    pub fn estimate_fee(&self, n_inputs: usize, n_outputs: usize) -> u64 {
        let size = TX_BASE_SIZE + TX_INPUT_SIZE * n_inputs + TX_OUTPUT_SIZE * n_outputs;
        (size as u64).saturating_mul(self.fee_per_byte)
    }

    /// Build and sign a transaction per the config.
    ///
    /// On success the selected outputs stay reserved until
    /// [`relay`](Self::relay) commits or releases them. On any failure
    /// nothing stays reserved.
    pub fn build(
        &self,
        config: &TxConfig,
        keyring: &KeyRing,
        cache: &OutputCache,
        current_height: u64,
    ) -> Result<TransactionSet, WalletError> {
        let target = validate_config(config, keyring)?;
        let account = config.account_index;
        // Change always occupies an output slot in the fee estimate so the
        // fee cannot drop below what was quoted during selection.
        let n_outputs = config.destinations.len() + 1;

        // Select and reserve. A concurrent build may win the race for our
        // candidates; re-select from the refreshed spendable set.
        let mut attempt = 0;
        let (selected, fee, reservation) = loop {
            let spendable = cache.spendable(account, current_height);
            let (selected, fee) = self.select_inputs(spendable, target, n_outputs)?;
            let outpoints: Vec<OutPoint> = selected.iter().map(|o| o.outpoint).collect();
            match cache.reserve(&outpoints) {
                Ok(id) => break (selected, fee, id),
                Err(e @ (CacheError::AlreadyReserved(_) | CacheError::AlreadySpent(_))) => {
                    attempt += 1;
                    if attempt >= MAX_RESERVE_ATTEMPTS {
                        return Err(e.into());
                    }
                    debug!(attempt, "selection contended, re-selecting");
                }
                Err(e) => return Err(e.into()),
            }
        };

        // From here on every failure must release the reservation.
        match self.assemble(config, keyring, &selected, target, fee, reservation) {
            Ok(tx_set) => Ok(tx_set),
            Err(e) => {
                let _ = cache.release(reservation);
                Err(e)
            }
        }
    }

    /// Relay a built transaction through the daemon.
    ///
    /// - success: the reservation commits (outputs become pending spends);
    /// - daemon rejected: the reservation is released (outputs spendable
    ///   again) and the error surfaces;
    /// - daemon unreachable: the reservation stays intact and the caller
    ///   may retry.
    pub fn relay(
        &self,
        tx_set: &TransactionSet,
        cache: &OutputCache,
        daemon: &dyn DaemonClient,
    ) -> Result<Hash256, WalletError> {
        match daemon.relay(&tx_set.serialized_hex) {
            Ok(()) => {
                cache.commit(tx_set.reservation)?;
                info!(tx_hash = %tx_set.tx_hash, fee = tx_set.fee, "transaction relayed");
                Ok(tx_set.tx_hash)
            }
            Err(e @ DaemonError::Rejected(_)) => {
                warn!(tx_hash = %tx_set.tx_hash, error = %e, "relay rejected, releasing outputs");
                cache.release(tx_set.reservation)?;
                Err(e.into())
            }
            Err(e) => {
                warn!(tx_hash = %tx_set.tx_hash, error = %e, "relay failed, reservation kept");
                Err(e.into())
            }
        }
    }

    /// Largest-amount-first input selection.
    ///
    /// Ties break by outpoint order so the selection is fully deterministic
    /// for a given spendable set. The fee is recomputed as inputs are added
    /// since each input enlarges the transaction.
    fn select_inputs(
        &self,
        mut candidates: Vec<OwnedOutput>,
        target: u64,
        n_outputs: usize,
    ) -> Result<(Vec<OwnedOutput>, u64), WalletError> {
        candidates.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.outpoint.cmp(&b.outpoint))
        });

        let available = candidates
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.amount));

        let mut selected = Vec::new();
        let mut total_in: u64 = 0;
        for candidate in candidates {
            total_in = total_in.saturating_add(candidate.amount);
            selected.push(candidate);

            let fee = self.estimate_fee(selected.len(), n_outputs);
            let required = target.saturating_add(fee);
            if total_in >= required {
                return Ok((selected, fee));
            }
        }

        let fee = self.estimate_fee(selected.len().max(1), n_outputs);
        Err(WalletError::InsufficientFunds {
            available,
            required: target.saturating_add(fee),
        })
    }

    /// Assemble outputs, sign inputs, and serialize.
    fn assemble(
        &self,
        config: &TxConfig,
        keyring: &KeyRing,
        selected: &[OwnedOutput],
        target: u64,
        fee: u64,
        reservation: ReservationId,
    ) -> Result<TransactionSet, WalletError> {
        let account = config.account_index;
        let input_sum = selected
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.amount));
        let change = input_sum - target - fee;

        let mut outputs: Vec<TxOutput> = config
            .destinations
            .iter()
            .map(|d| TxOutput {
                value: d.amount,
                pubkey_hash: d.address.pubkey_hash(),
            })
            .collect();
        if change > 0 {
            outputs.push(TxOutput {
                value: change,
                pubkey_hash: keyring.address_for(account, 0).pubkey_hash(),
            });
        }

        let inputs: Vec<TxInput> = selected
            .iter()
            .map(|o| TxInput {
                previous_output: o.outpoint,
                signature: vec![],
                public_key: vec![],
            })
            .collect();

        let mut tx = Transaction {
            version: 1,
            inputs,
            outputs,
            unlock_time: 0,
        };

        for (index, owned) in selected.iter().enumerate() {
            let keypair = keyring.keypair_for(owned.owner);
            sign_transaction_input(&mut tx, index, &keypair)
                .map_err(|e| WalletError::Signing(e.to_string()))?;
        }

        let tx_hash = tx
            .txid()
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        let bytes = bincode::encode_to_vec(&tx, bincode::config::standard())
            .map_err(|e| WalletError::Serialization(e.to_string()))?;

        debug!(
            tx_hash = %tx_hash,
            inputs = selected.len(),
            outputs = tx.outputs.len(),
            fee,
            change,
            "transaction assembled"
        );

        Ok(TransactionSet {
            serialized_hex: hex::encode(bytes),
            tx_hash,
            fee,
            reservation,
            account,
        })
    }
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check destinations: non-empty, positive amounts, matching network.
/// Returns the target sum.
fn validate_config(config: &TxConfig, keyring: &KeyRing) -> Result<u64, WalletError> {
    if config.destinations.is_empty() {
        return Err(WalletError::EmptyDestinations);
    }
    for destination in &config.destinations {
        if destination.amount == 0 {
            return Err(WalletError::InvalidAmount(format!(
                "zero amount to {}",
                destination.address
            )));
        }
        if destination.address.network() != keyring.network() {
            return Err(WalletError::InvalidDestination(format!(
                "{} is a {} address, wallet is on {}",
                destination.address,
                destination.address.network(),
                keyring.network()
            )));
        }
    }
    config
        .total_amount()
        .ok_or_else(|| WalletError::InvalidAmount("destination total overflows".into()))
}
