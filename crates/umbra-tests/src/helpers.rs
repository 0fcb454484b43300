//! Shared test helpers: deterministic keyrings, payment transactions, and
//! linked chains for the simulated daemon.

use umbra_core::address::{Address, AddressKind, Network};
use umbra_core::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};
use umbra_wallet::keyring::Entropy;
use umbra_wallet::{mnemonic, KeyRing};

/// Deterministic 24-word phrase from a single seed byte.
pub fn test_phrase(seed: u8) -> String {
    mnemonic::entropy_to_mnemonic(&Entropy::from_bytes([seed; 32]))
}

/// Deterministic testnet keyring from a single seed byte.
pub fn test_ring(seed: u8) -> KeyRing {
    KeyRing::from_entropy(&Entropy::from_bytes([seed; 32]), Network::Testnet)
}

/// A testnet address the wallet does not own.
pub fn foreign_address(seed: u8) -> Address {
    Address::new(Hash256([seed; 32]), AddressKind::Primary, Network::Testnet)
}

/// A transaction paying `amount` to `pubkey_hash`, spending a synthetic
/// outpoint derived from `marker` (distinct markers give distinct txids).
pub fn payment_tx(pubkey_hash: Hash256, amount: u64, marker: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint {
                txid: Hash256(blake3::hash(&marker.to_le_bytes()).into()),
                index: 0,
            },
            signature: vec![],
            public_key: vec![],
        }],
        outputs: vec![TxOutput {
            value: amount,
            pubkey_hash,
        }],
        unlock_time: 0,
    }
}

/// A coinbase transaction paying `amount` to `pubkey_hash`.
///
/// Carries the height in the signature bytes so each block's coinbase has a
/// distinct txid.
pub fn coinbase_tx(pubkey_hash: Hash256, amount: u64, height: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: height.to_le_bytes().to_vec(),
            public_key: vec![],
        }],
        outputs: vec![TxOutput {
            value: amount,
            pubkey_hash,
        }],
        unlock_time: 0,
    }
}

/// Build a hash-linked chain of `len` blocks; `payloads` assigns
/// transactions to heights.
pub fn linked_chain(len: u64, payloads: &[(u64, Vec<Transaction>)]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut prev = Hash256::ZERO;
    for height in 0..len {
        let transactions = payloads
            .iter()
            .filter(|(h, _)| *h == height)
            .flat_map(|(_, txs)| txs.clone())
            .collect();
        let block = Block {
            header: BlockHeader {
                version: 1,
                height,
                prev_hash: prev,
                timestamp: height * 120,
            },
            transactions,
        };
        prev = block.header.hash();
        blocks.push(block);
    }
    blocks
}

/// The next block extending `chain` with the given transactions.
pub fn next_block(chain: &[Block], transactions: Vec<Transaction>) -> Block {
    let tip = chain.last().expect("chain must not be empty");
    Block {
        header: BlockHeader {
            version: 1,
            height: tip.header.height + 1,
            prev_hash: tip.header.hash(),
            timestamp: (tip.header.height + 1) * 120,
        },
        transactions,
    }
}
