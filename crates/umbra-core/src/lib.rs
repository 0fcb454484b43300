//! # umbra-core
//! Foundation types for the Umbra wallet engine: protocol structures,
//! bech32m addresses, and Ed25519 signing.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod types;
