//! Property-based tests for hcn-interactor

#[cfg(test)]
mod tests {
    use hcn_core::FailureKind;
    use proptest::prelude::*;

    use crate::config::{CliOverrides, Config};
    use crate::output::{JsonResponse, OutputFormat};
    use crate::ExitCode;

    fn failure_kind() -> impl Strategy<Value = FailureKind> {
        prop_oneof![
            Just(FailureKind::InvalidInput),
            Just(FailureKind::InvalidKey),
            Just(FailureKind::Unreachable),
            Just(FailureKind::InvalidResponse),
            Just(FailureKind::NetworkMismatch),
            Just(FailureKind::Unauthorized),
            Just(FailureKind::CredentialNotFound),
            Just(FailureKind::LookupUnavailable),
            Just(FailureKind::Transport),
            Just(FailureKind::ConfirmationPending),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // A failed flow never exits 0 and never collides with Rejected.
        #[test]
        fn test_failures_never_succeed(kind in failure_kind()) {
            let code = ExitCode::from(kind);
            prop_assert_ne!(code, ExitCode::Success);
            prop_assert_ne!(code, ExitCode::Rejected);
            prop_assert_ne!(code, ExitCode::GeneralError);
        }

        #[test]
        fn test_output_format_case_insensitive(
            format in prop_oneof![Just("table"), Just("json"), Just("quiet")],
            upper in any::<bool>()
        ) {
            let input = if upper { format.to_uppercase() } else { format.to_string() };
            let parsed: OutputFormat = input.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), format);
        }

        // CLI flags win over file values; absent flags leave them alone.
        #[test]
        fn test_overrides_precedence(
            file_testnet in any::<bool>(),
            file_poll in any::<bool>(),
            testnet in proptest::option::of(Just(true)),
            no_poll in proptest::option::of(Just(true))
        ) {
            let mut config = Config::default();
            config.network.default = if file_testnet { "testnet" } else { "mainnet" }.to_string();
            config.polling.enabled = file_poll;

            let config = config.with_overrides(&CliOverrides {
                testnet,
                no_poll,
                ..Default::default()
            });

            let expect_testnet = testnet.is_some() || file_testnet;
            prop_assert_eq!(config.network.default == "testnet", expect_testnet);
            prop_assert_eq!(config.polling.enabled, file_poll && no_poll.is_none());
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn test_json_success_matches_exit_code(kind in proptest::option::of(failure_kind())) {
            let code = kind.map(ExitCode::from).unwrap_or(ExitCode::Success);
            let response = JsonResponse::new("data", "assign", code);
            let json: serde_json::Value =
                serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
            prop_assert_eq!(json["success"].as_bool(), Some(code == ExitCode::Success));
            prop_assert_eq!(json["exit_code"].as_i64(), Some(i32::from(code) as i64));
        }
    }
}
