//! Account addresses derived from secp256k1 public keys.
//!
//! An account is the last 20 bytes of `keccak256(uncompressed_pubkey[1..])`,
//! displayed with EIP-55 mixed-case checksum. Comparison is on the raw bytes,
//! so differently-cased renderings of the same address are equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::keccak256;

/// Error returned when an address string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountParseError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 40 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("address contains non-hex characters")]
    InvalidHex,
}

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Account([u8; 20]);

impl Account {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive the account from a 64-byte uncompressed public key (without the 0x04 tag).
    pub fn from_public_key_xy(xy: &[u8; 64]) -> Self {
        let digest = keccak256(xy);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex, the form used by subgraph entity ids.
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 checksummed rendering.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Account {
    type Err = AccountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AccountParseError::MissingPrefix)?;
        if digits.len() != 40 {
            return Err(AccountParseError::InvalidLength(digits.len()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out).map_err(|_| AccountParseError::InvalidHex)?;
        Ok(Self(out))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", self.to_checksum())
    }
}

impl Serialize for Account {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_round_trip() {
        let checksummed = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
        let account: Account = checksummed.parse().unwrap();
        assert_eq!(account.to_checksum(), checksummed);
        assert_eq!(account.to_string(), checksummed);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let a: Account = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        let b: Account = "0x7E5F4552091A69125D5DFCB7B8C2659029395BDF".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_lower_hex(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse::<Account>(),
            Err(AccountParseError::MissingPrefix)
        );
        assert_eq!("0x1234".parse::<Account>(), Err(AccountParseError::InvalidLength(4)));
        assert_eq!(
            "0xzz5f4552091a69125d5dfcb7b8c2659029395bdf".parse::<Account>(),
            Err(AccountParseError::InvalidHex)
        );
    }

    #[test]
    fn test_checksum_from_lowercase() {
        let account: Account = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23".parse().unwrap();
        assert_eq!(account.to_checksum(), "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
    }
}
