//! Property-based tests for hcn-core.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hcn_crypto::{verify_signature, KeySigner};
    use proptest::prelude::*;

    use crate::network::Network;
    use crate::payload::{PayloadBuilder, SignedAssignment};
    use crate::retry::RetryPolicy;
    use crate::types::{CredentialId, Freshness, FreshnessSource, NodeIdentity};

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn node(node_id: String) -> NodeIdentity {
        NodeIdentity {
            node_id,
            nonce: None,
            network: None,
        }
    }

    fn freshness(nonce: String, timestamp_ms: i64) -> Freshness {
        Freshness {
            nonce,
            timestamp_ms,
            source: FreshnessSource::Server,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_digit_strings_are_credentials(id in "[0-9]{1,78}") {
            let parsed: CredentialId = id.parse().unwrap();
            prop_assert_eq!(parsed.as_str(), id.as_str());
        }

        #[test]
        fn test_non_digit_credentials_rejected(
            prefix in "[0-9]{0,10}",
            bad in "[^0-9]",
            suffix in "[0-9]{0,10}"
        ) {
            let id = format!("{prefix}{bad}{suffix}");
            prop_assert!(id.parse::<CredentialId>().is_err());
        }

        // Any accepted payload encodes to exactly eight lines.
        #[test]
        fn test_canonical_payload_line_count(
            node_id in "\\PC{1,64}",
            nonce in "[a-zA-Z0-9]{1,64}",
            timestamp in any::<i64>(),
            testnet in any::<bool>()
        ) {
            let signer = KeySigner::load(KEY).unwrap();
            let built = PayloadBuilder::new(signer.account()).build(
                &"4649559795958260".parse().unwrap(),
                &node(node_id),
                Network::from_testnet_flag(testnet),
                freshness(nonce, timestamp),
            );
            if let Ok(payload) = built {
                prop_assert_eq!(payload.canonical_string().lines().count(), 8);
            }
        }

        // A signature over one payload never verifies against another.
        #[test]
        fn test_signature_bound_to_payload(
            a in "[0-9]{1,20}",
            b in "[0-9]{1,20}"
        ) {
            prop_assume!(a != b);
            let signer = KeySigner::load(KEY).unwrap();
            let builder = PayloadBuilder::new(signer.account());
            let make = |id: &str| {
                builder
                    .build(
                        &id.parse().unwrap(),
                        &node("node-1".into()),
                        Network::Mainnet,
                        freshness("n0nce".into(), 1),
                    )
                    .unwrap()
            };
            let signed = SignedAssignment::sign(make(&a), &signer).unwrap();
            let other = make(&b).canonical_bytes();
            prop_assert!(verify_signature(&other, signed.signature(), &signer.account()).is_err());
        }

        #[test]
        fn test_backoff_monotonic_and_capped(
            base_ms in 1u64..2_000,
            cap_ms in 1u64..20_000,
            attempt in 1u32..64
        ) {
            let policy = RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(cap_ms),
            };
            let d1 = policy.delay_after(attempt);
            let d2 = policy.delay_after(attempt + 1);
            prop_assert!(d1 <= d2);
            prop_assert!(d2 <= policy.max_delay);
        }
    }
}
