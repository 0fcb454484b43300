//! Owned-output cache: balances, spent tracking, and reservations.
//!
//! The cache is the single shared-mutable resource between the synchronizer
//! (which applies blocks) and the transaction builder (which reserves,
//! commits, and releases outputs). Every mutation runs under one mutex, so
//! a block's effects are never partially visible and two concurrent builds
//! can never both reserve the same output.
//!
//! Output life cycle:
//!
//! ```text
//! Unspent ──reserve──▶ Reserved ──commit──▶ PendingSpend ──apply_block──▶ Spent
//!    ▲                    │                                                 │
//!    └─────release────────┘                  rewind_to (reorg) ◀────────────┘
//! ```
//!
//! A confirmed spend seen in a block wins over any reservation state.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, warn};

use umbra_core::constants::{COINBASE_MATURITY, SPEND_CONFIRMATIONS};
use umbra_core::types::{Block, Hash256, OutPoint};

use crate::error::{CacheError, WalletError};
use crate::keyring::{KeyRing, SubaddressIndex};

/// Token for a set of outputs provisionally spent by an in-flight build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReservationId(pub(crate) u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spend status of an owned output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStatus {
    /// Spendable (subject to unlock height).
    Unspent,
    /// Provisionally spent by an in-flight transaction build.
    Reserved(ReservationId),
    /// Committed to a relayed transaction, not yet seen in a block.
    PendingSpend,
    /// Confirmed spent by a block at the given height.
    Spent {
        /// Height of the block that consumed this output.
        height: u64,
    },
}

/// An output owned by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedOutput {
    /// The outpoint identifying this output.
    pub outpoint: OutPoint,
    /// Value in motes.
    pub amount: u64,
    /// The subaddress this output pays.
    pub owner: SubaddressIndex,
    /// Height of the block that created this output.
    pub block_height: u64,
    /// Height at which this output becomes spendable.
    pub unlock_height: u64,
    /// Spend status.
    pub status: OutputStatus,
}

impl OwnedOutput {
    /// Whether this output counts towards the balance.
    pub fn is_unspent(&self) -> bool {
        self.status == OutputStatus::Unspent
    }

    /// Whether this output can be selected for spending at `height`.
    pub fn is_spendable(&self, height: u64) -> bool {
        self.is_unspent() && self.unlock_height <= height
    }
}

/// A transfer to the wallet discovered while scanning one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedTransfer {
    /// Transaction that paid the wallet.
    pub tx_id: Hash256,
    /// Receiving account.
    pub account: u32,
    /// Total motes received by the account in this transaction.
    pub amount: u64,
    /// Block height of the transfer.
    pub height: u64,
}

/// What applying one block changed.
#[derive(Clone, Debug, Default)]
pub struct BlockEffects {
    /// Incoming transfers, in transaction order.
    pub received: Vec<ReceivedTransfer>,
    /// Wallet outputs the block confirmed as spent.
    pub spent: Vec<OutPoint>,
    /// Accounts whose balance changed.
    pub touched_accounts: BTreeSet<u32>,
}

impl BlockEffects {
    /// Whether the block changed nothing for this wallet.
    pub fn is_empty(&self) -> bool {
        self.received.is_empty() && self.spent.is_empty()
    }
}

struct CacheInner {
    outputs: HashMap<OutPoint, OwnedOutput>,
    reservations: HashMap<u64, Vec<OutPoint>>,
    next_reservation: u64,
}

/// Thread-safe cache of the wallet's owned outputs.
pub struct OutputCache {
    inner: Mutex<CacheInner>,
}

impl OutputCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                outputs: HashMap::new(),
                reservations: HashMap::new(),
                next_reservation: 1,
            }),
        }
    }

    /// Scan one block: insert newly owned outputs, mark referenced outputs
    /// spent.
    ///
    /// Idempotent: re-applying a block neither duplicates outputs nor
    /// reports effects a prior application already reported.
    pub fn apply_block(
        &self,
        block: &Block,
        keyring: &KeyRing,
    ) -> Result<BlockEffects, WalletError> {
        let height = block.header.height;
        let mut inner = self.inner.lock();
        let mut effects = BlockEffects::default();

        for tx in &block.transactions {
            let tx_id = tx
                .txid()
                .map_err(|e| WalletError::Serialization(e.to_string()))?;

            // Inputs: anything we own that this tx consumes is now spent,
            // regardless of reservation state.
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    if let Some(output) = inner.outputs.get_mut(&input.previous_output) {
                        let already = matches!(output.status, OutputStatus::Spent { .. });
                        if !already {
                            if let OutputStatus::Reserved(id) = output.status {
                                warn!(
                                    outpoint = %output.outpoint,
                                    reservation = %id,
                                    "reserved output confirmed spent on-chain"
                                );
                            }
                            output.status = OutputStatus::Spent { height };
                            effects.touched_accounts.insert(output.owner.account);
                            effects.spent.push(input.previous_output);
                        }
                    }
                }
            }

            // Outputs: anything paying a subaddress we recognize is ours.
            let mut received_per_account: BTreeMap<u32, u64> = BTreeMap::new();
            for (index, tx_out) in tx.outputs.iter().enumerate() {
                let Some(owner) = keyring.owner_of(&tx_out.pubkey_hash) else {
                    continue;
                };
                let outpoint = OutPoint {
                    txid: tx_id,
                    index: index as u64,
                };
                if inner.outputs.contains_key(&outpoint) {
                    continue;
                }

                let confirmations = if tx.is_coinbase() {
                    COINBASE_MATURITY
                } else {
                    SPEND_CONFIRMATIONS
                };
                let unlock_height = (height + confirmations).max(tx.unlock_time);

                inner.outputs.insert(
                    outpoint,
                    OwnedOutput {
                        outpoint,
                        amount: tx_out.value,
                        owner,
                        block_height: height,
                        unlock_height,
                        status: OutputStatus::Unspent,
                    },
                );
                *received_per_account.entry(owner.account).or_insert(0) += tx_out.value;
                effects.touched_accounts.insert(owner.account);
            }

            for (account, amount) in received_per_account {
                effects.received.push(ReceivedTransfer {
                    tx_id,
                    account,
                    amount,
                    height,
                });
            }
        }

        if !effects.is_empty() {
            debug!(
                height,
                received = effects.received.len(),
                spent = effects.spent.len(),
                "block touched wallet"
            );
        }
        Ok(effects)
    }

    /// Sum of unspent output values for an account.
    pub fn balance(&self, account: u32) -> u64 {
        let inner = self.inner.lock();
        inner
            .outputs
            .values()
            .filter(|o| o.owner.account == account && o.is_unspent())
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// Sum of unspent, unlocked output values for an account.
    pub fn unlocked_balance(&self, account: u32, current_height: u64) -> u64 {
        let inner = self.inner.lock();
        inner
            .outputs
            .values()
            .filter(|o| o.owner.account == account && o.is_spendable(current_height))
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }

    /// The spendable outputs of an account: unspent, unreserved, unlocked.
    pub fn spendable(&self, account: u32, current_height: u64) -> Vec<OwnedOutput> {
        let inner = self.inner.lock();
        inner
            .outputs
            .values()
            .filter(|o| o.owner.account == account && o.is_spendable(current_height))
            .cloned()
            .collect()
    }

    /// Atomically reserve a set of outputs for an in-flight build.
    ///
    /// All-or-nothing: if any output is unknown, already reserved, or
    /// already spent, nothing is reserved and the offending outpoint is
    /// reported.
    pub fn reserve(&self, outpoints: &[OutPoint]) -> Result<ReservationId, CacheError> {
        let mut inner = self.inner.lock();

        for outpoint in outpoints {
            let output = inner
                .outputs
                .get(outpoint)
                .ok_or(CacheError::UnknownOutput(*outpoint))?;
            match output.status {
                OutputStatus::Unspent => {}
                OutputStatus::Reserved(_) => {
                    return Err(CacheError::AlreadyReserved(*outpoint));
                }
                OutputStatus::PendingSpend | OutputStatus::Spent { .. } => {
                    return Err(CacheError::AlreadySpent(*outpoint));
                }
            }
        }

        let id = ReservationId(inner.next_reservation);
        inner.next_reservation += 1;
        for outpoint in outpoints {
            if let Some(output) = inner.outputs.get_mut(outpoint) {
                output.status = OutputStatus::Reserved(id);
            }
        }
        inner.reservations.insert(id.0, outpoints.to_vec());
        debug!(reservation = %id, count = outpoints.len(), "outputs reserved");
        Ok(id)
    }

    /// Release a reservation: its outputs become spendable again.
    ///
    /// Outputs that were confirmed spent on-chain while reserved stay spent.
    pub fn release(&self, id: ReservationId) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        let outpoints = inner
            .reservations
            .remove(&id.0)
            .ok_or(CacheError::UnknownReservation(id.0))?;
        for outpoint in outpoints {
            if let Some(output) = inner.outputs.get_mut(&outpoint) {
                if output.status == OutputStatus::Reserved(id) {
                    output.status = OutputStatus::Unspent;
                }
            }
        }
        debug!(reservation = %id, "reservation released");
        Ok(())
    }

    /// Commit a reservation after successful relay: its outputs become
    /// pending spends until a block confirms them.
    pub fn commit(&self, id: ReservationId) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        let outpoints = inner
            .reservations
            .remove(&id.0)
            .ok_or(CacheError::UnknownReservation(id.0))?;
        for outpoint in outpoints {
            if let Some(output) = inner.outputs.get_mut(&outpoint) {
                if output.status == OutputStatus::Reserved(id) {
                    output.status = OutputStatus::PendingSpend;
                }
            }
        }
        debug!(reservation = %id, "reservation committed");
        Ok(())
    }

    /// Undo the effects of blocks above `height` (reorg rewind).
    ///
    /// Outputs created above `height` are dropped; outputs confirmed spent
    /// above `height` become unspent again. Returns the number of outputs
    /// affected.
    pub fn rewind_to(&self, height: u64) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.outputs.len();
        inner.outputs.retain(|_, o| o.block_height <= height);
        let mut affected = before - inner.outputs.len();

        for output in inner.outputs.values_mut() {
            if let OutputStatus::Spent { height: spent_at } = output.status {
                if spent_at > height {
                    output.status = OutputStatus::Unspent;
                    affected += 1;
                }
            }
        }
        if affected > 0 {
            warn!(height, affected, "output cache rewound");
        }
        affected
    }

    /// Look up one output by outpoint.
    pub fn output(&self, outpoint: &OutPoint) -> Option<OwnedOutput> {
        self.inner.lock().outputs.get(outpoint).cloned()
    }

    /// Number of tracked outputs (any status).
    pub fn len(&self) -> usize {
        self.inner.lock().outputs.len()
    }

    /// Whether the cache tracks no outputs.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().outputs.is_empty()
    }
}

impl Default for OutputCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OutputCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("OutputCache")
            .field("outputs", &inner.outputs.len())
            .field("reservations", &inner.reservations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::address::Network;
    use umbra_core::constants::COIN;
    use umbra_core::types::{BlockHeader, Transaction, TxInput, TxOutput};

    use crate::keyring::Entropy;

    fn test_ring() -> KeyRing {
        KeyRing::from_entropy(&Entropy::from_bytes([1u8; 32]), Network::Testnet)
    }

    fn payment_tx(ring: &KeyRing, account: u32, index: u32, amount: u64, marker: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([marker as u8; 32]),
                    index: 0,
                },
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: amount,
                pubkey_hash: ring.address_for(account, index).pubkey_hash(),
            }],
            unlock_time: 0,
        }
    }

    fn spend_tx(outpoint: OutPoint) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: outpoint,
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: 1,
                pubkey_hash: Hash256([0xEE; 32]),
            }],
            unlock_time: 0,
        }
    }

    fn block_at(height: u64, transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                height,
                prev_hash: Hash256([height as u8; 32]),
                timestamp: height * 120,
            },
            transactions,
        }
    }

    /// Apply a payment and return the resulting outpoint.
    fn seed_output(cache: &OutputCache, ring: &KeyRing, height: u64, amount: u64) -> OutPoint {
        let tx = payment_tx(ring, 0, 0, amount, height);
        let tx_id = tx.txid().unwrap();
        cache.apply_block(&block_at(height, vec![tx]), ring).unwrap();
        OutPoint { txid: tx_id, index: 0 }
    }

    #[test]
    fn scan_recognizes_owned_output() {
        let ring = test_ring();
        let cache = OutputCache::new();

        let tx = payment_tx(&ring, 0, 0, 5 * COIN, 1);
        let effects = cache.apply_block(&block_at(10, vec![tx]), &ring).unwrap();

        assert_eq!(effects.received.len(), 1);
        assert_eq!(effects.received[0].amount, 5 * COIN);
        assert_eq!(effects.received[0].account, 0);
        assert_eq!(cache.balance(0), 5 * COIN);
    }

    #[test]
    fn scan_ignores_foreign_outputs() {
        let ring = test_ring();
        let other = KeyRing::from_entropy(&Entropy::from_bytes([9u8; 32]), Network::Testnet);
        let cache = OutputCache::new();

        let tx = payment_tx(&other, 0, 0, 5 * COIN, 1);
        let effects = cache.apply_block(&block_at(10, vec![tx]), &ring).unwrap();

        assert!(effects.is_empty());
        assert_eq!(cache.balance(0), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn reapply_is_idempotent() {
        let ring = test_ring();
        let cache = OutputCache::new();

        let block = block_at(10, vec![payment_tx(&ring, 0, 0, 5 * COIN, 1)]);
        cache.apply_block(&block, &ring).unwrap();
        let effects = cache.apply_block(&block, &ring).unwrap();

        assert!(effects.is_empty(), "second application must be a no-op");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.balance(0), 5 * COIN);
    }

    #[test]
    fn balances_are_per_account() {
        let ring = test_ring();
        let cache = OutputCache::new();

        let block = block_at(
            10,
            vec![
                payment_tx(&ring, 0, 0, 3 * COIN, 1),
                payment_tx(&ring, 1, 0, 2 * COIN, 2),
                payment_tx(&ring, 1, 4, 1 * COIN, 3),
            ],
        );
        let effects = cache.apply_block(&block, &ring).unwrap();

        assert_eq!(cache.balance(0), 3 * COIN);
        assert_eq!(cache.balance(1), 3 * COIN);
        assert_eq!(cache.balance(2), 0);
        assert_eq!(
            effects.touched_accounts.iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn unlock_height_standard_output() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 50, COIN);

        let output = cache.output(&outpoint).unwrap();
        assert_eq!(output.unlock_height, 50 + SPEND_CONFIRMATIONS);

        assert_eq!(cache.unlocked_balance(0, 50), 0);
        assert_eq!(cache.unlocked_balance(0, 59), 0);
        assert_eq!(cache.unlocked_balance(0, 60), COIN);
    }

    #[test]
    fn unlock_height_coinbase_output() {
        let ring = test_ring();
        let cache = OutputCache::new();

        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: 10 * COIN,
                pubkey_hash: ring.primary_address().pubkey_hash(),
            }],
            unlock_time: 0,
        };
        cache.apply_block(&block_at(100, vec![coinbase]), &ring).unwrap();

        assert_eq!(cache.balance(0), 10 * COIN);
        assert_eq!(cache.unlocked_balance(0, 100 + COINBASE_MATURITY - 1), 0);
        assert_eq!(cache.unlocked_balance(0, 100 + COINBASE_MATURITY), 10 * COIN);
    }

    #[test]
    fn explicit_unlock_time_wins_when_later() {
        let ring = test_ring();
        let cache = OutputCache::new();

        let mut tx = payment_tx(&ring, 0, 0, COIN, 1);
        tx.unlock_time = 500;
        cache.apply_block(&block_at(10, vec![tx]), &ring).unwrap();

        let output = cache.spendable(0, 500)[0].clone();
        assert_eq!(output.unlock_height, 500);
        assert_eq!(cache.unlocked_balance(0, 499), 0);
        assert_eq!(cache.unlocked_balance(0, 500), COIN);
    }

    #[test]
    fn spend_marks_output() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let effects = cache
            .apply_block(&block_at(20, vec![spend_tx(outpoint)]), &ring)
            .unwrap();

        assert_eq!(effects.spent, vec![outpoint]);
        assert_eq!(cache.balance(0), 0);
        assert_eq!(
            cache.output(&outpoint).unwrap().status,
            OutputStatus::Spent { height: 20 }
        );
    }

    #[test]
    fn chain_spend_wins_over_reservation() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        cache
            .apply_block(&block_at(20, vec![spend_tx(outpoint)]), &ring)
            .unwrap();

        // Releasing afterwards must not resurrect the spent output.
        cache.release(id).unwrap();
        assert_eq!(
            cache.output(&outpoint).unwrap().status,
            OutputStatus::Spent { height: 20 }
        );
        assert_eq!(cache.balance(0), 0);
    }

    #[test]
    fn reserve_excludes_from_balances() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        assert_eq!(cache.balance(0), 0);
        assert_eq!(cache.unlocked_balance(0, 100), 0);
        assert!(cache.spendable(0, 100).is_empty());

        cache.release(id).unwrap();
        assert_eq!(cache.balance(0), 5 * COIN);
        assert_eq!(cache.unlocked_balance(0, 100), 5 * COIN);
    }

    #[test]
    fn double_reserve_rejected() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let _id = cache.reserve(&[outpoint]).unwrap();
        let err = cache.reserve(&[outpoint]).unwrap_err();
        assert_eq!(err, CacheError::AlreadyReserved(outpoint));
    }

    #[test]
    fn reserve_is_all_or_nothing() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let a = seed_output(&cache, &ring, 10, 1 * COIN);
        let b = seed_output(&cache, &ring, 11, 2 * COIN);

        let unknown = OutPoint {
            txid: Hash256([0xFF; 32]),
            index: 0,
        };
        let err = cache.reserve(&[a, b, unknown]).unwrap_err();
        assert_eq!(err, CacheError::UnknownOutput(unknown));

        // Neither a nor b may be left reserved.
        assert_eq!(cache.balance(0), 3 * COIN);
        assert!(cache.reserve(&[a, b]).is_ok());
    }

    #[test]
    fn reserve_unknown_output_rejected() {
        let cache = OutputCache::new();
        let unknown = OutPoint {
            txid: Hash256([1; 32]),
            index: 9,
        };
        assert_eq!(
            cache.reserve(&[unknown]).unwrap_err(),
            CacheError::UnknownOutput(unknown)
        );
    }

    #[test]
    fn commit_moves_to_pending() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        cache.commit(id).unwrap();

        assert_eq!(
            cache.output(&outpoint).unwrap().status,
            OutputStatus::PendingSpend
        );
        assert_eq!(cache.balance(0), 0);

        // Reserving a pending output is a programming error.
        assert_eq!(
            cache.reserve(&[outpoint]).unwrap_err(),
            CacheError::AlreadySpent(outpoint)
        );
    }

    #[test]
    fn pending_spend_confirmed_by_block() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        cache.commit(id).unwrap();
        cache
            .apply_block(&block_at(30, vec![spend_tx(outpoint)]), &ring)
            .unwrap();

        assert_eq!(
            cache.output(&outpoint).unwrap().status,
            OutputStatus::Spent { height: 30 }
        );
    }

    #[test]
    fn release_twice_is_an_error() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        cache.release(id).unwrap();
        assert_eq!(
            cache.release(id).unwrap_err(),
            CacheError::UnknownReservation(id.0)
        );
    }

    #[test]
    fn commit_after_release_is_an_error() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, COIN);

        let id = cache.reserve(&[outpoint]).unwrap();
        cache.release(id).unwrap();
        assert_eq!(
            cache.commit(id).unwrap_err(),
            CacheError::UnknownReservation(id.0)
        );
    }

    #[test]
    fn rewind_drops_new_outputs() {
        let ring = test_ring();
        let cache = OutputCache::new();
        seed_output(&cache, &ring, 10, 1 * COIN);
        seed_output(&cache, &ring, 20, 2 * COIN);

        let affected = cache.rewind_to(15);
        assert_eq!(affected, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.balance(0), 1 * COIN);
    }

    #[test]
    fn rewind_unspends_recent_spends() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);
        cache
            .apply_block(&block_at(20, vec![spend_tx(outpoint)]), &ring)
            .unwrap();
        assert_eq!(cache.balance(0), 0);

        let affected = cache.rewind_to(15);
        assert_eq!(affected, 1);
        assert_eq!(cache.balance(0), 5 * COIN);
        assert!(cache.output(&outpoint).unwrap().is_unspent());
    }

    #[test]
    fn rewind_keeps_old_spends() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let outpoint = seed_output(&cache, &ring, 10, 5 * COIN);
        cache
            .apply_block(&block_at(12, vec![spend_tx(outpoint)]), &ring)
            .unwrap();

        cache.rewind_to(15);
        assert_eq!(
            cache.output(&outpoint).unwrap().status,
            OutputStatus::Spent { height: 12 }
        );
    }

    #[test]
    fn reservation_ids_are_unique() {
        let ring = test_ring();
        let cache = OutputCache::new();
        let a = seed_output(&cache, &ring, 10, COIN);
        let b = seed_output(&cache, &ring, 11, COIN);

        let id_a = cache.reserve(&[a]).unwrap();
        let id_b = cache.reserve(&[b]).unwrap();
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn concurrent_reserves_are_mutually_exclusive() {
        use std::sync::Arc;

        let ring = test_ring();
        let cache = Arc::new(OutputCache::new());
        let mut outpoints = Vec::new();
        for h in 0..8u64 {
            outpoints.push(seed_output(&cache, &ring, h, COIN));
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let outpoints = outpoints.clone();
            handles.push(std::thread::spawn(move || {
                cache.reserve(&outpoints).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1, "exactly one concurrent reserve may win");
    }

    #[test]
    fn cache_debug_format() {
        let cache = OutputCache::new();
        let debug = format!("{cache:?}");
        assert!(debug.contains("OutputCache"));
    }
}
