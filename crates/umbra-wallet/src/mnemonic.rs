//! BIP-39 mnemonic seed backup and restoration.

use bip39::{Language, Mnemonic};

use crate::error::WalletError;
use crate::keyring::Entropy;

/// Convert 32 bytes of entropy to a 24-word BIP-39 mnemonic phrase.
pub fn entropy_to_mnemonic(entropy: &Entropy) -> String {
    let m = Mnemonic::from_entropy_in(Language::English, entropy.as_bytes())
        .expect("32 bytes always produces valid mnemonic");
    m.to_string()
}

/// Parse a BIP-39 mnemonic phrase and extract the 32-byte entropy.
///
/// Normalizes whitespace and converts to lowercase before parsing. Unknown
/// words, checksum failures, and phrases with other than 24 words are all
/// rejected as [`WalletError::InvalidSeed`].
pub fn mnemonic_to_entropy(phrase: &str) -> Result<Entropy, WalletError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let m = Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidSeed(e.to_string()))?;
    let entropy = m.to_entropy();
    if entropy.len() != 32 {
        return Err(WalletError::InvalidSeed(format!(
            "expected 32 bytes of entropy, got {}",
            entropy.len()
        )));
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&entropy);
    Ok(Entropy::from_bytes(bytes))
}
