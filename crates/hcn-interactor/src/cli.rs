//! CLI command definitions and argument parsing

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use hcn_core::{
    AssignmentOrchestrator, AssignmentRequest, CredentialId, CredentialLookup, HttpNodeClient,
    Network, SubgraphClient,
};
use hcn_crypto::{Account, KeySigner};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::{CliOverrides, Config};
use crate::output::{LookupOutput, OutputFormat, OutputFormatter, SharesOutput};
use crate::ExitCode;

/// Hypercycle node interactor - Manager Mode assignment CLI
#[derive(Parser)]
#[command(name = "hcn-interactor")]
#[command(version, about = "Assign Hypercycle Licenses/ANFEs to Manager Mode nodes")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: table, json or quiet [default: from config, else table]
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug mode (wire-level tracing)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overrides carried by global and command flags.
    pub fn overrides(&self) -> CliOverrides {
        let flag = |set: bool| set.then_some(true);
        let mut overrides = CliOverrides {
            output_format: self.output.map(|f| f.to_string()),
            verbose: flag(self.verbose),
            debug: flag(self.debug),
            ..Default::default()
        };
        match &self.command {
            Commands::Assign(args) => {
                overrides.testnet = flag(args.testnet);
                overrides.skip_ownership_check = flag(args.skip_ownership_check);
                overrides.no_poll = flag(args.no_poll);
            }
            Commands::Lookup(args) => overrides.testnet = flag(args.testnet),
            Commands::Account(_) | Commands::Config(_) => {}
        }
        overrides
    }

    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format = config.output.format.parse().unwrap_or_default();
        let formatter = OutputFormatter::new(format, config.output.verbose);

        match self.command {
            Commands::Assign(args) => args.execute(&config, &formatter).await,
            Commands::Lookup(args) => args.execute(&config, &formatter).await,
            Commands::Account(args) => Ok(args.execute(&formatter)),
            Commands::Config(args) => args.execute(&config, self.config, &formatter),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign a License/ANFE to a Manager Mode node
    Assign(AssignArgs),
    /// Look up the owner of a License/ANFE
    Lookup(LookupArgs),
    /// Show the account derived from a private key
    Account(AccountArgs),
    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct AssignArgs {
    /// License or ANFE token id
    #[arg(long = "license-anfe", value_name = "ID")]
    pub license_anfe: String,

    /// Node base URL, e.g. http://node.example:8080
    #[arg(long, value_name = "URL")]
    pub node_url: String,

    /// Private key of the credential owner or its delegated signer
    #[arg(long, value_name = "HEX", env = "HCN_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Use the testnet deployment
    #[arg(long)]
    pub testnet: bool,

    /// Do not verify credential ownership against the subgraphs
    #[arg(long)]
    pub skip_ownership_check: bool,

    /// Do not poll the node for a pending confirmation
    #[arg(long)]
    pub no_poll: bool,
}

impl AssignArgs {
    pub async fn execute(
        self,
        config: &Config,
        formatter: &OutputFormatter,
    ) -> anyhow::Result<ExitCode> {
        let network = config.network();
        let private_key = Zeroizing::new(self.private_key);

        let node = HttpNodeClient::new(config.node_client_config(), config.node_api.clone())?;
        let mut orchestrator =
            AssignmentOrchestrator::new(Arc::new(node), config.assignment_options());
        if config.subgraph.enabled {
            let lookup =
                SubgraphClient::new(config.subgraph_endpoints(network), config.subgraph_timeout())?;
            orchestrator = orchestrator.with_lookup(Arc::new(lookup));
        } else {
            formatter.warning("Ownership check skipped");
        }

        formatter.progress(&format!(
            "Assigning {} to {} on {}",
            self.license_anfe, self.node_url, network
        ));
        let report = orchestrator
            .run(AssignmentRequest {
                credential: self.license_anfe,
                node_url: self.node_url,
                private_key,
                network,
            })
            .await;

        let code = ExitCode::from_report(&report);
        debug!(exit_code = code.name(), "assign command complete");

        if let Some(record) = &report.record {
            if !record.has_required_backing {
                formatter.warning("Credential lacks the required backing tokens");
            }
        }
        formatter.emit(&formatter.format_report(&report, code));
        if report.is_confirmed() {
            formatter.success("Assignment confirmed");
        }
        Ok(code)
    }
}

#[derive(Args)]
pub struct LookupArgs {
    /// License or ANFE token id
    #[arg(
        long = "license-anfe",
        value_name = "ID",
        required_unless_present = "operator",
        conflicts_with = "operator"
    )]
    pub license_anfe: Option<String>,

    /// List the share proposals operated by this address instead
    #[arg(long, value_name = "ADDR")]
    pub operator: Option<String>,

    /// Use the testnet deployment
    #[arg(long)]
    pub testnet: bool,
}

impl LookupArgs {
    pub async fn execute(
        self,
        config: &Config,
        formatter: &OutputFormatter,
    ) -> anyhow::Result<ExitCode> {
        let network = config.network();
        let client =
            SubgraphClient::new(config.subgraph_endpoints(network), config.subgraph_timeout())?;

        if let Some(operator) = self.operator {
            return Ok(lookup_operator(&client, &operator, network, formatter).await);
        }

        let input = self.license_anfe.unwrap_or_default();
        let credential: CredentialId = match input.parse() {
            Ok(id) => id,
            Err(e) => {
                let output =
                    formatter.format_error(&e.to_string(), "lookup", ExitCode::InvalidInput);
                formatter.emit(&output);
                return Ok(ExitCode::InvalidInput);
            }
        };

        formatter.progress(&format!("Looking up {credential} on {network}"));
        match client.lookup(&credential).await {
            Ok(record) => {
                let code = if record.is_some() {
                    ExitCode::Success
                } else {
                    ExitCode::Unauthorized
                };
                let output = LookupOutput {
                    credential: credential.to_string(),
                    network: network.to_string(),
                    record,
                };
                formatter.emit(&formatter.format_lookup(&output, code));
                Ok(code)
            }
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                let output =
                    formatter.format_error(&e.to_string(), "lookup", ExitCode::Unreachable);
                formatter.emit(&output);
                Ok(ExitCode::Unreachable)
            }
        }
    }
}

async fn lookup_operator(
    client: &SubgraphClient,
    operator: &str,
    network: Network,
    formatter: &OutputFormatter,
) -> ExitCode {
    let account: Account = match operator.parse() {
        Ok(account) => account,
        Err(e) => {
            let output = formatter.format_error(
                &format!("invalid operator address: {e}"),
                "lookup",
                ExitCode::InvalidInput,
            );
            formatter.emit(&output);
            return ExitCode::InvalidInput;
        }
    };

    formatter.progress(&format!("Listing share proposals for {account} on {network}"));
    match client.share_proposals(&account).await {
        Ok(proposals) => {
            let output = SharesOutput {
                operator: account.to_string(),
                network: network.to_string(),
                proposals,
            };
            formatter.emit(&formatter.format_shares(&output));
            ExitCode::Success
        }
        Err(e) => {
            warn!(error = %e, "share proposal lookup failed");
            let output = formatter.format_error(&e.to_string(), "lookup", ExitCode::Unreachable);
            formatter.emit(&output);
            ExitCode::Unreachable
        }
    }
}

#[derive(Args)]
pub struct AccountArgs {
    /// Private key to derive the account from
    #[arg(long, value_name = "HEX", env = "HCN_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
}

impl AccountArgs {
    pub fn execute(self, formatter: &OutputFormatter) -> ExitCode {
        let private_key = Zeroizing::new(self.private_key);
        match KeySigner::load(&private_key) {
            Ok(signer) => {
                formatter.emit(&formatter.format_account(&signer.account()));
                ExitCode::Success
            }
            Err(e) => {
                let output =
                    formatter.format_error(&e.to_string(), "account", ExitCode::InvalidInput);
                formatter.emit(&output);
                ExitCode::InvalidInput
            }
        }
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file if it does not exist
    Init,
    /// Print the configuration file path
    Path,
}

impl ConfigArgs {
    pub fn execute(
        self,
        config: &Config,
        custom_path: Option<PathBuf>,
        formatter: &OutputFormatter,
    ) -> anyhow::Result<ExitCode> {
        let path = custom_path.or_else(Config::default_path);
        match self.command {
            ConfigCommand::Show => {
                formatter.emit(&formatter.format_config(config));
                Ok(ExitCode::Success)
            }
            ConfigCommand::Init => {
                let Some(path) = path else {
                    formatter.emit(&formatter.format_error(
                        "no configuration directory available",
                        "config init",
                        ExitCode::GeneralError,
                    ));
                    return Ok(ExitCode::GeneralError);
                };
                if Config::create_default_if_missing(&path)? {
                    formatter.success(&format!("Wrote {}", path.display()));
                } else {
                    let message = format!("{} already exists, left unchanged", path.display());
                    formatter.warning(&message);
                }
                Ok(ExitCode::Success)
            }
            ConfigCommand::Path => {
                match path {
                    Some(path) if !formatter.is_quiet() => println!("{}", path.display()),
                    Some(_) => {}
                    None => {
                        formatter.emit(&formatter.format_error(
                            "no configuration directory available",
                            "config path",
                            ExitCode::GeneralError,
                        ));
                        return Ok(ExitCode::GeneralError);
                    }
                }
                Ok(ExitCode::Success)
            }
        }
    }
}
