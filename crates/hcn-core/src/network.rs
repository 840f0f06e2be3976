//! Network selection and per-network chain parameters.
//!
//! `Network::params()` is the single place that maps the mainnet/testnet
//! selector to chain ids and the Hypercycle subgraph endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const ETHEREUM_SUBGRAPH: &str =
    "https://api.studio.thegraph.com/query/90034/hypercycle-ethereum/v0.7.26";
const BASE_SUBGRAPH: &str =
    "https://api.studio.thegraph.com/query/90034/hypercycle-base/v0.7.26";
const SEPOLIA_SUBGRAPH: &str =
    "https://api.studio.thegraph.com/query/90034/hypercycle-ethereum-sepolia/v0.7.26";
const BASE_SEPOLIA_SUBGRAPH: &str =
    "https://api.studio.thegraph.com/query/90034/hypercycle-base-sepolia/v0.7.26";

/// Network context for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        }
    }

    pub fn params(&self) -> NetworkParams {
        match self {
            Network::Mainnet => NetworkParams {
                network: *self,
                chain_id: 1,
                subgraphs: vec![
                    SubgraphEndpoint::new(
                        "ethereum",
                        1,
                        ETHEREUM_SUBGRAPH,
                    ),
                    SubgraphEndpoint::new(
                        "base",
                        8453,
                        BASE_SUBGRAPH,
                    ),
                ],
                require_node_network: true,
            },
            Network::Testnet => NetworkParams {
                network: *self,
                chain_id: 11_155_111,
                subgraphs: vec![
                    SubgraphEndpoint::new(
                        "ethereum",
                        11_155_111,
                        SEPOLIA_SUBGRAPH,
                    ),
                    SubgraphEndpoint::new(
                        "base",
                        84_532,
                        BASE_SEPOLIA_SUBGRAPH,
                    ),
                ],
                require_node_network: false,
            },
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            _ => Err(format!("Unknown network: {s}")),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subgraph deployment indexing one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphEndpoint {
    pub chain: String,
    pub chain_id: u64,
    pub url: String,
}

impl SubgraphEndpoint {
    pub fn new(chain: &str, chain_id: u64, url: &str) -> Self {
        Self {
            chain: chain.to_string(),
            chain_id,
            url: url.to_string(),
        }
    }
}

/// Resolved chain parameters for a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    /// Chain id bound into the signed payload.
    pub chain_id: u64,
    /// Subgraphs queried in priority order.
    pub subgraphs: Vec<SubgraphEndpoint>,
    /// Whether the node must state its network in the handshake.
    /// Testnet tolerates nodes that omit it.
    pub require_node_network: bool,
}

impl NetworkParams {
    /// Check the network a node reported against this context.
    pub fn check_node_network(&self, reported: Option<&str>) -> Result<(), String> {
        match reported {
            Some(name) => match name.parse::<Network>() {
                Ok(n) if n == self.network => Ok(()),
                Ok(n) => Err(format!("node is on {n}, request is for {}", self.network)),
                Err(_) => Err(format!("node reported unknown network '{name}'")),
            },
            None if self.require_node_network => Err(format!(
                "node did not report its network; {} requires it",
                self.network
            )),
            None => Ok(()),
        }
    }
}
