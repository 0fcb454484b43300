//! Deterministic key derivation: spend/view secrets and subaddresses.
//!
//! A wallet's identity is 32 bytes of entropy (backed up as a 24-word
//! BIP-39 phrase). BLAKE3 keyed derivation produces the spend secret from
//! the entropy and the view secret from the spend secret; each
//! (account, index) subaddress keypair derives from the view secret, so a
//! view-only party can recognize incoming outputs for every subaddress
//! without being able to spend them.
//!
//! The keyring is immutable after construction: the subaddress lookahead
//! table is built once and all queries take `&self`.

use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use umbra_core::address::{Address, AddressKind, Network};
use umbra_core::crypto::KeyPair;
use umbra_core::types::Hash256;

use crate::error::WalletError;
use crate::mnemonic;

/// BLAKE3 KDF context for the spend secret.
const SPEND_KDF_CONTEXT: &str = "umbra-keyring-spend-v1";

/// BLAKE3 KDF context for the view secret.
const VIEW_KDF_CONTEXT: &str = "umbra-keyring-view-v1";

/// BLAKE3 KDF context for subaddress keypairs.
const SUBADDRESS_KDF_CONTEXT: &str = "umbra-keyring-subaddress-v1";

/// Accounts covered by the scan lookahead table.
pub const ACCOUNT_LOOKAHEAD: u32 = 8;

/// Subaddress indices per account covered by the scan lookahead table.
pub const SUBADDRESS_LOOKAHEAD: u32 = 32;

/// 32 bytes of wallet entropy.
///
/// Secret material is zeroized on drop to prevent leaking key material in
/// freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Entropy {
    bytes: [u8; 32],
}

impl Entropy {
    /// Generate random entropy from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create entropy from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for Entropy {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entropy")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Hierarchical subaddress identifier: (account, index).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    serde::Serialize, serde::Deserialize,
)]
pub struct SubaddressIndex {
    /// Account index (major).
    pub account: u32,
    /// Subaddress index within the account (minor).
    pub index: u32,
}

impl SubaddressIndex {
    /// The primary address slot: account 0, index 0.
    pub const PRIMARY: Self = Self {
        account: 0,
        index: 0,
    };

    /// Create a subaddress identifier.
    pub fn new(account: u32, index: u32) -> Self {
        Self { account, index }
    }

    /// Whether this is the primary address slot.
    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

impl fmt::Display for SubaddressIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.index)
    }
}

/// Deterministic key ring: spend secret, view secret, and the subaddress
/// recognition table.
pub struct KeyRing {
    network: Network,
    spend_secret: [u8; 32],
    view_secret: [u8; 32],
    /// Reverse lookup: pubkey_hash -> subaddress, for scan recognition.
    by_hash: HashMap<Hash256, SubaddressIndex>,
}

impl KeyRing {
    /// Derive a keyring from a 24-word mnemonic phrase.
    ///
    /// Fails with [`WalletError::InvalidSeed`] on unknown words, checksum
    /// failure, or a phrase that does not carry 32 bytes of entropy.
    pub fn derive(phrase: &str, network: Network) -> Result<Self, WalletError> {
        let entropy = mnemonic::mnemonic_to_entropy(phrase)?;
        Ok(Self::from_entropy(&entropy, network))
    }

    /// Build a keyring directly from entropy.
    pub fn from_entropy(entropy: &Entropy, network: Network) -> Self {
        let spend_secret = blake3::derive_key(SPEND_KDF_CONTEXT, entropy.as_bytes());
        let view_secret = blake3::derive_key(VIEW_KDF_CONTEXT, &spend_secret);

        let mut ring = Self {
            network,
            spend_secret,
            view_secret,
            by_hash: HashMap::new(),
        };

        // Precompute the recognition table; the ring is immutable afterwards.
        let mut by_hash =
            HashMap::with_capacity((ACCOUNT_LOOKAHEAD * SUBADDRESS_LOOKAHEAD) as usize);
        for account in 0..ACCOUNT_LOOKAHEAD {
            for index in 0..SUBADDRESS_LOOKAHEAD {
                let sub = SubaddressIndex::new(account, index);
                let pkh = ring.keypair_for(sub).public_key().pubkey_hash();
                by_hash.insert(pkh, sub);
            }
        }
        ring.by_hash = by_hash;
        ring
    }

    /// The keypair owning the given subaddress slot.
    ///
    /// The primary slot is the spend keypair itself; every other slot is a
    /// view-secret derivation, so the result is deterministic for any
    /// (account, index), including slots beyond the lookahead table.
    pub fn keypair_for(&self, sub: SubaddressIndex) -> KeyPair {
        if sub.is_primary() {
            return KeyPair::from_secret_bytes(self.spend_secret);
        }
        let mut ikm = Vec::with_capacity(40);
        ikm.extend_from_slice(&self.view_secret);
        ikm.extend_from_slice(&sub.account.to_le_bytes());
        ikm.extend_from_slice(&sub.index.to_le_bytes());
        KeyPair::from_secret_bytes(blake3::derive_key(SUBADDRESS_KDF_CONTEXT, &ikm))
    }

    /// The address for a subaddress slot.
    pub fn address_for(&self, account: u32, index: u32) -> Address {
        let sub = SubaddressIndex::new(account, index);
        let kind = if sub.is_primary() {
            AddressKind::Primary
        } else {
            AddressKind::Subaddress
        };
        Address::from_public_key(&self.keypair_for(sub).public_key(), kind, self.network)
    }

    /// The wallet's primary address (account 0, index 0).
    pub fn primary_address(&self) -> Address {
        self.address_for(0, 0)
    }

    /// Look up which subaddress owns a pubkey hash, if any.
    ///
    /// Covers the lookahead window
    /// ([`ACCOUNT_LOOKAHEAD`] × [`SUBADDRESS_LOOKAHEAD`] slots).
    pub fn owner_of(&self, pubkey_hash: &Hash256) -> Option<SubaddressIndex> {
        self.by_hash.get(pubkey_hash).copied()
    }

    /// The network this keyring derives addresses for.
    pub fn network(&self) -> Network {
        self.network
    }
}

impl Drop for KeyRing {
    fn drop(&mut self) {
        self.spend_secret.zeroize();
        self.view_secret.zeroize();
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("network", &self.network)
            .field("known_subaddresses", &self.by_hash.len())
            .finish_non_exhaustive()
    }
}
