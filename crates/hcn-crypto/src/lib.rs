//! Key handling and message signing for Hypercycle Manager Mode assignments.
//!
//! Accounts are Ethereum-style secp256k1 addresses. Assignment messages are
//! signed as EIP-191 personal messages so any standard wallet library can
//! verify them on the node side.

#![forbid(unsafe_code)]

pub mod account;
pub mod hash;
pub mod signer;

#[cfg(test)]
mod proptests;

pub use account::{Account, AccountParseError};
pub use signer::{recover_account, verify_signature, KeySigner, Signature, SignerError};
