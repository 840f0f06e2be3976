//! Configuration management for hcn-interactor
//!
//! Configuration is stored in TOML format. Every section is optional and
//! falls back to built-in defaults.
//!
//! # Configuration File Locations
//!
//! - Linux: `~/.config/hcn/interactor.toml`
//! - macOS: `~/Library/Application Support/io.hypercycle.hcn/interactor.toml`
//! - Windows: `%APPDATA%\hypercycle\hcn\config\interactor.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use hcn_core::{
    AssignmentOptions, Network, NodeApiSchema, NodeClientConfig, PollPolicy, RetryPolicy,
    SubgraphEndpoint,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Interactor configuration
///
/// # Example TOML
///
/// ```toml
/// [network]
/// default = "mainnet"  # "mainnet" | "testnet"
///
/// [node]
/// handshake_timeout_seconds = 10
/// submit_timeout_seconds = 30
/// status_timeout_seconds = 10
/// handshake_attempts = 2
///
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 1000
/// max_delay_ms = 8000
///
/// [polling]
/// enabled = true
/// interval_ms = 2000
/// max_wait_seconds = 30
///
/// [output]
/// format = "table"  # "table" | "json" | "quiet"
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Node Manager Mode API conventions
    #[serde(default)]
    pub node_api: NodeApiSchema,

    #[serde(default)]
    pub subgraph: SubgraphConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network used when --testnet is not given: "mainnet" or "testnet"
    #[serde(default = "default_network")]
    pub default: String,
}

fn default_network() -> String {
    "mainnet".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default: default_network(),
        }
    }
}

/// Node connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,

    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_seconds: u64,

    #[serde(default = "default_status_timeout")]
    pub status_timeout_seconds: u64,

    /// Handshake attempts before the node is reported unreachable
    #[serde(default = "default_handshake_attempts")]
    pub handshake_attempts: u32,
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_submit_timeout() -> u64 {
    30
}

fn default_status_timeout() -> u64 {
    10
}

fn default_handshake_attempts() -> u32 {
    2
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_seconds: default_handshake_timeout(),
            submit_timeout_seconds: default_submit_timeout(),
            status_timeout_seconds: default_status_timeout(),
            handshake_attempts: default_handshake_attempts(),
        }
    }
}

/// Submission retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

/// Status polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    #[serde(default = "default_poll_wait")]
    pub max_wait_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_poll_wait() -> u64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_poll_interval(),
            max_wait_seconds: default_poll_wait(),
        }
    }
}

/// Ownership lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphConfig {
    /// Check on-chain ownership before contacting the node
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_subgraph_timeout")]
    pub timeout_seconds: u64,

    /// Mainnet endpoints (empty = built-in Ethereum and Base subgraphs)
    #[serde(default)]
    pub mainnet: Vec<SubgraphEndpoint>,

    /// Testnet endpoints (empty = built-in Sepolia subgraphs)
    #[serde(default)]
    pub testnet: Vec<SubgraphEndpoint>,
}

fn default_subgraph_timeout() -> u64 {
    15
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: default_subgraph_timeout(),
            mainnet: Vec::new(),
            testnet: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "table", "json", "quiet"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub verbose: bool,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "hypercycle", "hcn")
            .map(|dirs| dirs.config_dir().join("interactor.toml"))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write the default configuration to `path` unless a file exists there.
    /// Returns whether a file was written.
    pub fn create_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save(path)?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.default.parse::<Network>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid network '{}'. Valid values: [\"mainnet\", \"testnet\"]",
                self.network.default
            )));
        }

        let valid_formats = ["table", "json", "quiet"];
        if !valid_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid output format '{}'. Valid values: {:?}",
                self.output.format, valid_formats
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        for (name, value) in [
            ("node.handshake_timeout_seconds", self.node.handshake_timeout_seconds),
            ("node.submit_timeout_seconds", self.node.submit_timeout_seconds),
            ("node.status_timeout_seconds", self.node.status_timeout_seconds),
            ("polling.interval_ms", self.polling.interval_ms),
            ("polling.max_wait_seconds", self.polling.max_wait_seconds),
            ("subgraph.timeout_seconds", self.subgraph.timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.node.handshake_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "node.handshake_attempts must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }

        for endpoint in self.subgraph.mainnet.iter().chain(&self.subgraph.testnet) {
            let ok = url::Url::parse(&endpoint.url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !ok {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid subgraph URL '{}': must be an http:// or https:// URL",
                    endpoint.url
                )));
            }
        }

        self.node_api
            .validate()
            .map_err(ConfigError::ValidationError)?;

        Ok(())
    }

    /// Network used when the CLI does not select one.
    pub fn network(&self) -> Network {
        self.network.default.parse().unwrap_or_default()
    }

    pub fn node_client_config(&self) -> NodeClientConfig {
        NodeClientConfig {
            handshake_timeout: Duration::from_secs(self.node.handshake_timeout_seconds),
            submit_timeout: Duration::from_secs(self.node.submit_timeout_seconds),
            status_timeout: Duration::from_secs(self.node.status_timeout_seconds),
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn poll_policy(&self) -> Option<PollPolicy> {
        self.polling.enabled.then(|| PollPolicy {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_wait: Duration::from_secs(self.polling.max_wait_seconds),
        })
    }

    pub fn assignment_options(&self) -> AssignmentOptions {
        AssignmentOptions {
            retry: self.retry_policy(),
            poll: self.poll_policy(),
            handshake_attempts: self.node.handshake_attempts,
            handshake_retry_delay: Duration::from_millis(self.retry.base_delay_ms),
            check_ownership: self.subgraph.enabled,
        }
    }

    /// Subgraph endpoints for `network`, configured or built in.
    pub fn subgraph_endpoints(&self, network: Network) -> Vec<SubgraphEndpoint> {
        let configured = match network {
            Network::Mainnet => &self.subgraph.mainnet,
            Network::Testnet => &self.subgraph.testnet,
        };
        if configured.is_empty() {
            network.params().subgraphs
        } else {
            configured.clone()
        }
    }

    pub fn subgraph_timeout(&self) -> Duration {
        Duration::from_secs(self.subgraph.timeout_seconds)
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    /// `--testnet`
    pub testnet: Option<bool>,
    /// `--skip-ownership-check`
    pub skip_ownership_check: Option<bool>,
    /// `--no-poll`
    pub no_poll: Option<bool>,
}

impl Config {
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref format) = overrides.output_format {
            self.output.format = format.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.output.verbose = verbose;
        }
        if overrides.debug == Some(true) {
            self.logging.level = "debug".to_string();
        }
        if overrides.testnet == Some(true) {
            self.network.default = Network::Testnet.to_string();
        }
        if overrides.skip_ownership_check == Some(true) {
            self.subgraph.enabled = false;
        }
        if overrides.no_poll == Some(true) {
            self.polling.enabled = false;
        }
        self
    }
}
