//! KeySigner: private key parsing, account derivation and message signing.
//!
//! The signing key is zeroized when the `KeySigner` is dropped, and the
//! intermediate decoded buffer never outlives `load`. Callers should keep the
//! signer scoped to a single invocation.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::account::Account;
use crate::hash::eip191_hash;

/// Error type for key loading, signing and verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidKey(&'static str),
    #[error("signing failed")]
    SigningFailed,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("signature does not match account: recovered {recovered}, expected {expected}")]
    AccountMismatch { recovered: Account, expected: Account },
}

/// A 65-byte recoverable signature `r || s || v` with `v` in {27, 28}.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 65]);

impl Signature {
    pub const LEN: usize = 65;

    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignerError> {
        let arr: [u8; 65] = bytes.try_into().map_err(|_| SignerError::InvalidSignature)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// `0x`-prefixed lowercase hex, the usual wire form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    fn split(&self) -> Result<(EcdsaSignature, RecoveryId), SignerError> {
        let sig = EcdsaSignature::from_slice(&self.0[..64])
            .map_err(|_| SignerError::InvalidSignature)?;
        let v = match self.0[64] {
            27 | 28 => self.0[64] - 27,
            0 | 1 => self.0[64],
            _ => return Err(SignerError::InvalidSignature),
        };
        let recid = RecoveryId::from_byte(v).ok_or(SignerError::InvalidSignature)?;
        Ok((sig, recid))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// Holds the secret key for the lifetime of one assignment flow.
pub struct KeySigner {
    key: SigningKey,
    account: Account,
}

impl KeySigner {
    /// Expected length of the hex body after the `0x` prefix.
    pub const HEX_LEN: usize = 64;

    /// Parse a `0x`-prefixed 32-byte hex private key.
    ///
    /// Fails fast on a missing prefix, wrong length, non-hex characters, or a
    /// scalar outside the curve order. Never performs I/O.
    pub fn load(private_key_hex: &str) -> Result<Self, SignerError> {
        let digits = private_key_hex
            .strip_prefix("0x")
            .ok_or(SignerError::InvalidKey("missing 0x prefix"))?;
        if digits.len() != Self::HEX_LEN {
            return Err(SignerError::InvalidKey("expected 64 hex digits"));
        }

        let mut buf = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(digits, &mut buf[..])
            .map_err(|_| SignerError::InvalidKey("non-hex characters"))?;

        let key = SigningKey::from_slice(&buf[..])
            .map_err(|_| SignerError::InvalidKey("scalar out of range"))?;
        let account = account_of(key.verifying_key());
        Ok(Self { key, account })
    }

    pub fn account(&self) -> Account {
        self.account
    }

    /// Sign `message` as an EIP-191 personal message.
    ///
    /// RFC 6979 nonces make the signature deterministic for a given key and
    /// message; `s` is normalized to the lower half of the curve order.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let digest = eip191_hash(message);
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|_| SignerError::SigningFailed)?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + 27;
        Ok(Signature(out))
    }
}

impl fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySigner")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn account_of(key: &VerifyingKey) -> Account {
    let point = key.to_encoded_point(false);
    let mut xy = [0u8; 64];
    xy.copy_from_slice(&point.as_bytes()[1..]);
    Account::from_public_key_xy(&xy)
}

/// Recover the account that signed an EIP-191 `message`.
pub fn recover_account(message: &[u8], signature: &Signature) -> Result<Account, SignerError> {
    let (sig, recid) = signature.split()?;
    let digest = eip191_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recid)
        .map_err(|_| SignerError::InvalidSignature)?;
    Ok(account_of(&key))
}

/// Verify that `signature` over `message` was produced by `expected`.
pub fn verify_signature(
    message: &[u8],
    signature: &Signature,
    expected: &Account,
) -> Result<(), SignerError> {
    let recovered = recover_account(message, signature)?;
    if &recovered == expected {
        Ok(())
    } else {
        Err(SignerError::AccountMismatch {
            recovered,
            expected: *expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_DOCS: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_known_account_derivation() {
        let signer = KeySigner::load(KEY_ONE).unwrap();
        assert_eq!(
            signer.account().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );

        let signer = KeySigner::load(KEY_DOCS).unwrap();
        assert_eq!(
            signer.account().to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }

    #[test]
    fn test_load_rejects_malformed_keys() {
        let cases = [
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f3623",
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f36231800",
            "0xzz0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            "0x0000000000000000000000000000000000000000000000000000000000000000",
            "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            "",
        ];
        for case in cases {
            assert!(
                matches!(KeySigner::load(case), Err(SignerError::InvalidKey(_))),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sign_is_deterministic_and_verifiable() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let message = b"hypercycle-manager-assignment/v1\ncredential:1";

        let sig1 = signer.sign(message).unwrap();
        let sig2 = signer.sign(message).unwrap();

        assert_eq!(sig1, sig2);
        assert!(sig1.v() == 27 || sig1.v() == 28);
        assert!(verify_signature(message, &sig1, &signer.account()).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let sig = signer.sign(b"original").unwrap();
        assert!(verify_signature(b"tampered", &sig, &signer.account()).is_err());
    }

    #[test]
    fn test_wrong_account_fails() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let other = KeySigner::load(KEY_ONE).unwrap();
        let sig = signer.sign(b"message").unwrap();

        let err = verify_signature(b"message", &sig, &other.account()).unwrap_err();
        assert!(matches!(err, SignerError::AccountMismatch { .. }));
    }

    #[test]
    fn test_recovery_accepts_raw_recovery_id() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let sig = signer.sign(b"message").unwrap();

        let mut raw = *sig.as_bytes();
        raw[64] -= 27;
        let raw = Signature::from_bytes(raw);
        assert_eq!(recover_account(b"message", &raw).unwrap(), signer.account());
    }

    #[test]
    fn test_invalid_v_rejected() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let mut bytes = *signer.sign(b"message").unwrap().as_bytes();
        bytes[64] = 35;
        assert_eq!(
            recover_account(b"message", &Signature::from_bytes(bytes)),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = KeySigner::load(KEY_DOCS).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("4c0883a6"));
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let signer = KeySigner::load(KEY_ONE).unwrap();
        let sig = signer.sign(b"x").unwrap();
        let hex_str = sig.to_hex();
        assert_eq!(hex_str.len(), 2 + 130);
        let decoded = hex::decode(hex_str.trim_start_matches("0x")).unwrap();
        assert_eq!(Signature::from_slice(&decoded).unwrap(), sig);
    }
}
