//! Encrypted wallet keystore.
//!
//! The wallet's identity (mnemonic, network, restore height) persists as a
//! small encrypted file:
//!
//! ```text
//! header_len (4 bytes LE) || header_json || salt (32) || nonce (12) || ciphertext + tag
//! ```
//!
//! The header is unencrypted JSON with magic bytes and a format version.
//! The payload is AES-256-GCM over the JSON-encoded [`KeystoreData`], with
//! the key derived from the wallet password via Argon2id and the random
//! salt. A wrong password fails authentication and surfaces as
//! [`WalletError::InvalidPassword`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use umbra_core::address::Network;

use crate::error::WalletError;

/// Magic string identifying an Umbra keystore file.
pub const KEYSTORE_MAGIC: &str = "UMBW";

/// Current keystore format version.
pub const KEYSTORE_VERSION: u32 = 1;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Minimum encrypted payload size (salt + nonce + auth tag).
const MIN_ENCRYPTED_LEN: usize = SALT_LEN + NONCE_LEN + 16;

/// Unencrypted keystore file header.
#[derive(Serialize, Deserialize)]
struct KeystoreHeader {
    magic: String,
    version: u32,
}

/// The wallet identity persisted in a keystore.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct KeystoreData {
    /// 24-word mnemonic seed phrase.
    pub mnemonic: String,
    /// Network the wallet operates on.
    pub network: Network,
    /// Height scanning starts from on a fresh cache.
    pub restore_height: u64,
}

/// Derive a 256-bit encryption key from a password and salt via Argon2id.
fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; 32], WalletError> {
    let mut key = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Encrypt plaintext with a password. Returns `salt || nonce || ciphertext+tag`.
fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt data produced by [`encrypt`]. Wrong password → `InvalidPassword`.
fn decrypt(encrypted: &[u8], password: &[u8]) -> Result<Vec<u8>, WalletError> {
    if encrypted.len() < MIN_ENCRYPTED_LEN {
        return Err(WalletError::CorruptedFile(format!(
            "encrypted data too short: {} < {MIN_ENCRYPTED_LEN}",
            encrypted.len()
        )));
    }

    let salt = &encrypted[..SALT_LEN];
    let nonce_bytes = &encrypted[SALT_LEN..SALT_LEN + NONCE_LEN];
    let ciphertext = &encrypted[SALT_LEN + NONCE_LEN..];

    let key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| WalletError::InvalidPassword)
}

/// Write an encrypted keystore file.
pub fn save(path: &Path, password: &[u8], data: &KeystoreData) -> Result<(), WalletError> {
    let header = KeystoreHeader {
        magic: KEYSTORE_MAGIC.to_string(),
        version: KEYSTORE_VERSION,
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;
    let payload_json =
        serde_json::to_vec(data).map_err(|e| WalletError::Serialization(e.to_string()))?;

    let encrypted = encrypt(&payload_json, password)?;

    let header_len = header_json.len() as u32;
    let mut file_data = Vec::with_capacity(4 + header_json.len() + encrypted.len());
    file_data.extend_from_slice(&header_len.to_le_bytes());
    file_data.extend_from_slice(&header_json);
    file_data.extend_from_slice(&encrypted);

    std::fs::write(path, &file_data).map_err(|e| WalletError::Io(e.to_string()))?;
    debug!(path = %path.display(), "keystore written");
    Ok(())
}

/// Read and decrypt a keystore file.
pub fn load(path: &Path, password: &[u8]) -> Result<KeystoreData, WalletError> {
    let file_data = std::fs::read(path).map_err(|e| WalletError::Io(e.to_string()))?;

    if file_data.len() < 4 {
        return Err(WalletError::CorruptedFile("file too short".into()));
    }

    let header_len = u32::from_le_bytes(
        file_data[..4]
            .try_into()
            .expect("slice of length 4 converts to [u8; 4]"),
    ) as usize;
    if file_data.len() < 4 + header_len {
        return Err(WalletError::CorruptedFile("header truncated".into()));
    }

    let header_json = &file_data[4..4 + header_len];
    let header: KeystoreHeader = serde_json::from_slice(header_json)
        .map_err(|e| WalletError::CorruptedFile(format!("invalid header: {e}")))?;

    if header.magic != KEYSTORE_MAGIC {
        return Err(WalletError::CorruptedFile("invalid magic bytes".into()));
    }
    if header.version != KEYSTORE_VERSION {
        return Err(WalletError::CorruptedFile(format!(
            "unsupported version: {}",
            header.version
        )));
    }

    let encrypted = &file_data[4 + header_len..];
    let payload_json = decrypt(encrypted, password)?;

    serde_json::from_slice(&payload_json)
        .map_err(|e| WalletError::CorruptedFile(format!("invalid payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> KeystoreData {
        KeystoreData {
            mnemonic: "abandon ability able about above absent absorb abstract absurd abuse \
                       access accident account accuse achieve acid acoustic acquire across act \
                       action actor actress actual"
                .to_string(),
            network: Network::Testnet,
            restore_height: 1234,
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");
        let data = sample_data();

        save(&path, b"hunter2", &data).unwrap();
        let loaded = load(&path, b"hunter2").unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn wrong_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");

        save(&path, b"correct", &sample_data()).unwrap();
        let err = load(&path, b"wrong").unwrap_err();
        assert_eq!(err, WalletError::InvalidPassword);
    }

    #[test]
    fn empty_password_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");

        save(&path, b"", &sample_data()).unwrap();
        assert_eq!(load(&path, b"").unwrap(), sample_data());
        assert!(load(&path, b"something").is_err());
    }

    #[test]
    fn garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");
        std::fs::write(&path, b"garbage").unwrap();

        let err = load(&path, b"pass").unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn truncated_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");
        std::fs::write(&path, [0u8; 2]).unwrap();

        let err = load(&path, b"pass").unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn tampered_ciphertext_fails_as_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");
        save(&path, b"pass", &sample_data()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path, b"pass").unwrap_err();
        assert_eq!(err, WalletError::InvalidPassword);
    }

    #[test]
    fn bad_magic_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.umb");
        save(&path, b"pass", &sample_data()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        // Header JSON starts after the 4-byte length; corrupt the magic
        // value inside it.
        let json_start = 4;
        let header_len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        let header = String::from_utf8(bytes[json_start..json_start + header_len].to_vec())
            .unwrap()
            .replace(KEYSTORE_MAGIC, "XXXX");
        bytes.splice(json_start..json_start + header_len, header.into_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let err = load(&path, b"pass").unwrap_err();
        assert!(matches!(err, WalletError::CorruptedFile(_)));
    }

    #[test]
    fn nonexistent_file_is_io_error() {
        let err = load(Path::new("/nonexistent/umbra/wallet.umb"), b"pass").unwrap_err();
        assert!(matches!(err, WalletError::Io(_)));
    }

    #[test]
    fn encrypt_produces_different_ciphertexts() {
        // Random salt and nonce: same plaintext encrypts differently.
        let a = encrypt(b"payload", b"pass").unwrap();
        let b = encrypt(b"payload", b"pass").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derive_key_is_deterministic_per_salt() {
        let k1 = derive_key(b"pass", b"0123456789abcdef0123456789abcdef").unwrap();
        let k2 = derive_key(b"pass", b"0123456789abcdef0123456789abcdef").unwrap();
        let k3 = derive_key(b"pass", b"fedcba9876543210fedcba9876543210").unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
