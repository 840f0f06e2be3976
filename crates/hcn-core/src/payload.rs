//! Canonical assignment payload and its signed form.
//!
//! The canonical encoding is a versioned, newline separated list of
//! `key:value` lines in fixed order. Node ids and nonces are validated so a
//! value can never inject an extra line.

use hcn_crypto::hash::eip191_hash;
use hcn_crypto::{verify_signature, Account, KeySigner, Signature, SignerError};
use serde::Serialize;

use crate::errors::InputError;
use crate::network::Network;
use crate::types::{check_token, CredentialId, Freshness, NodeIdentity};

/// Format tag on the first line of every canonical payload.
pub const PAYLOAD_FORMAT: &str = "hypercycle-manager-assignment/v1";

/// Assignment message, built once per flow and never mutated after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentPayload {
    pub network: Network,
    pub chain_id: u64,
    pub credential: CredentialId,
    pub node_id: String,
    pub issuer: Account,
    pub freshness: Freshness,
}

impl AssignmentPayload {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_string().into_bytes()
    }

    pub fn canonical_string(&self) -> String {
        format!(
            "{PAYLOAD_FORMAT}\n\
             network:{}\n\
             chain_id:{}\n\
             credential:{}\n\
             node:{}\n\
             issuer:{}\n\
             nonce:{}\n\
             timestamp:{}",
            self.network,
            self.chain_id,
            self.credential,
            self.node_id,
            self.issuer.to_checksum(),
            self.freshness.nonce,
            self.freshness.timestamp_ms,
        )
    }
}

/// Builds payloads for one issuer.
#[derive(Debug, Clone, Copy)]
pub struct PayloadBuilder {
    issuer: Account,
}

impl PayloadBuilder {
    pub fn new(issuer: Account) -> Self {
        Self { issuer }
    }

    pub fn issuer(&self) -> Account {
        self.issuer
    }

    pub fn build(
        &self,
        credential: &CredentialId,
        node: &NodeIdentity,
        network: Network,
        freshness: Freshness,
    ) -> Result<AssignmentPayload, InputError> {
        check_token("node id", &node.node_id).map_err(InputError::NodeUrl)?;
        check_token("nonce", &freshness.nonce).map_err(InputError::Freshness)?;

        Ok(AssignmentPayload {
            network,
            chain_id: network.params().chain_id,
            credential: credential.clone(),
            node_id: node.node_id.clone(),
            issuer: self.issuer,
            freshness,
        })
    }
}

/// Payload plus signature. Retries resend this exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAssignment {
    payload: AssignmentPayload,
    message: Vec<u8>,
    signature: Signature,
    signer: Account,
}

impl SignedAssignment {
    /// Sign `payload` and check the signature recovers to the signer.
    pub fn sign(payload: AssignmentPayload, signer: &KeySigner) -> Result<Self, SignerError> {
        if payload.issuer != signer.account() {
            return Err(SignerError::AccountMismatch {
                recovered: signer.account(),
                expected: payload.issuer,
            });
        }
        let message = payload.canonical_bytes();
        let signature = signer.sign(&message)?;
        let signed = Self {
            payload,
            message,
            signature,
            signer: signer.account(),
        };
        signed.verify()?;
        Ok(signed)
    }

    pub fn verify(&self) -> Result<(), SignerError> {
        if self.message != self.payload.canonical_bytes() {
            return Err(SignerError::InvalidSignature);
        }
        verify_signature(&self.message, &self.signature, &self.signer)
    }

    pub fn payload(&self) -> &AssignmentPayload {
        &self.payload
    }

    /// Exact bytes that were signed.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn signer(&self) -> Account {
        self.signer
    }

    /// `0x`-hex EIP-191 digest of the signed message.
    pub fn digest_hex(&self) -> String {
        format!("0x{}", hex::encode(eip191_hash(&self.message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FreshnessSource;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn node() -> NodeIdentity {
        NodeIdentity {
            node_id: "node.example:8080".into(),
            nonce: None,
            network: Some("mainnet".into()),
        }
    }

    fn freshness() -> Freshness {
        Freshness {
            nonce: "00112233445566778899aabbccddeeff".into(),
            timestamp_ms: 1_700_000_000_000,
            source: FreshnessSource::Local,
        }
    }

    fn payload(signer: &KeySigner) -> AssignmentPayload {
        PayloadBuilder::new(signer.account())
            .build(
                &"4649559795958260".parse().unwrap(),
                &node(),
                Network::Mainnet,
                freshness(),
            )
            .unwrap()
    }

    #[test]
    fn test_canonical_encoding() {
        let signer = KeySigner::load(KEY).unwrap();
        let text = payload(&signer).canonical_string();
        let expected = "hypercycle-manager-assignment/v1\n\
                        network:mainnet\n\
                        chain_id:1\n\
                        credential:4649559795958260\n\
                        node:node.example:8080\n\
                        issuer:0x2c7536E3605D9C16a7a3D7b1898e529396a65c23\n\
                        nonce:00112233445566778899aabbccddeeff\n\
                        timestamp:1700000000000";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_network_changes_chain_id() {
        let signer = KeySigner::load(KEY).unwrap();
        let p = PayloadBuilder::new(signer.account())
            .build(
                &"1".parse().unwrap(),
                &node(),
                Network::Testnet,
                freshness(),
            )
            .unwrap();
        assert_eq!(p.chain_id, 11_155_111);
        assert!(p.canonical_string().contains("network:testnet\nchain_id:11155111\n"));
    }

    #[test]
    fn test_node_id_with_newline_rejected() {
        let signer = KeySigner::load(KEY).unwrap();
        let mut bad = node();
        bad.node_id = "node\nissuer:0x0".into();
        let result = PayloadBuilder::new(signer.account()).build(
            &"1".parse().unwrap(),
            &bad,
            Network::Mainnet,
            freshness(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_signed_assignment_verifies() {
        let signer = KeySigner::load(KEY).unwrap();
        let signed = SignedAssignment::sign(payload(&signer), &signer).unwrap();
        assert!(signed.verify().is_ok());
        assert_eq!(signed.signer(), signer.account());
        assert_eq!(signed.message(), payload(&signer).canonical_bytes().as_slice());
        assert_eq!(signed.digest_hex().len(), 66);
    }

    #[test]
    fn test_sign_with_foreign_issuer_fails() {
        let signer = KeySigner::load(KEY).unwrap();
        let other = KeySigner::load(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let result = SignedAssignment::sign(payload(&other), &signer);
        assert!(matches!(result, Err(SignerError::AccountMismatch { .. })));
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let signer = KeySigner::load(KEY).unwrap();
        let mut signed = SignedAssignment::sign(payload(&signer), &signer).unwrap();
        signed.payload.node_id = "other-node".into();
        assert!(signed.verify().is_err());
    }
}
