//! Property-based tests for hcn-crypto.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::account::Account;
    use crate::signer::{recover_account, verify_signature, KeySigner};

    fn key_hex(seed: [u8; 32]) -> String {
        format!("0x{}", hex::encode(seed))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Any key accepted by load signs deterministically and the signature
        // recovers to the key's own account.
        #[test]
        fn test_sign_verify_round_trip(
            seed in any::<[u8; 32]>(),
            message in prop::collection::vec(any::<u8>(), 0..256)
        ) {
            let Ok(signer) = KeySigner::load(&key_hex(seed)) else {
                // zero or >= curve order
                return Ok(());
            };
            let sig1 = signer.sign(&message).unwrap();
            let sig2 = signer.sign(&message).unwrap();
            prop_assert_eq!(sig1, sig2);
            prop_assert!(verify_signature(&message, &sig1, &signer.account()).is_ok());
        }

        // Flipping any bit of the message changes the recovered account.
        #[test]
        fn test_mutated_message_fails(
            message in prop::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255
        ) {
            let signer = KeySigner::load(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            ).unwrap();
            let sig = signer.sign(&message).unwrap();

            let mut tampered = message.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= flip;

            prop_assert!(verify_signature(&tampered, &sig, &signer.account()).is_err());
        }

        // Keys without the 0x prefix are always refused.
        #[test]
        fn test_unprefixed_keys_rejected(seed in any::<[u8; 32]>()) {
            prop_assert!(KeySigner::load(&hex::encode(seed)).is_err());
        }

        // Address parsing accepts any casing of the checksum rendering.
        #[test]
        fn test_account_display_parse_round_trip(bytes in any::<[u8; 20]>()) {
            let account = Account::from_bytes(bytes);
            let parsed: Account = account.to_checksum().parse().unwrap();
            prop_assert_eq!(parsed, account);
            let lower: Account = account.to_lower_hex().parse().unwrap();
            prop_assert_eq!(lower, account);
        }

        // Recovery never panics on arbitrary 65-byte input.
        #[test]
        fn test_recover_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 65)) {
            let sig = crate::signer::Signature::from_slice(&bytes).unwrap();
            let _ = recover_account(b"message", &sig);
        }
    }
}
