//! Credential ownership lookup through the Hypercycle subgraphs.
//!
//! Every chain subgraph of the selected network is queried concurrently. The
//! first chain in configured order that knows the credential wins, and an
//! ANFE record on a chain takes priority over a License record there.
//! Share proposals by operator are collected from every chain that answers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use hcn_crypto::Account;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::LookupError;
use crate::network::SubgraphEndpoint;
use crate::types::CredentialId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CredentialKind {
    Anfe,
    License,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::Anfe => f.write_str("ANFE"),
            CredentialKind::License => f.write_str("LICENSE"),
        }
    }
}

/// On-chain state of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub kind: CredentialKind,
    pub chain: String,
    pub owner: String,
    pub delegated_signer: Option<String>,
    pub has_required_backing: bool,
    pub backing_tokens: Vec<String>,
}

impl CredentialRecord {
    pub fn is_authorized(&self, signer: &Account) -> bool {
        let signer = signer.to_lower_hex();
        self.owner.eq_ignore_ascii_case(&signer)
            || self
                .delegated_signer
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(&signer))
    }

    /// Require `signer` to be the owner or the delegated signer.
    pub fn authorize(
        &self,
        credential: &CredentialId,
        signer: &Account,
    ) -> Result<(), LookupError> {
        if self.is_authorized(signer) {
            return Ok(());
        }
        Err(LookupError::Unauthorized {
            credential: credential.to_string(),
            signer: signer.to_checksum(),
            owner: self.owner.clone(),
        })
    }
}

/// Share proposal listing an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareProposal {
    pub chain: String,
    pub proposal_id: String,
    pub share_number_id: String,
    pub chypc_id: String,
    pub license_id: String,
    pub r_token_id: String,
    pub w_token_id: String,
    pub operator: String,
}

#[async_trait]
pub trait CredentialLookup: Send + Sync {
    /// `Ok(None)` when no indexed chain knows the credential.
    async fn lookup(
        &self,
        credential: &CredentialId,
    ) -> Result<Option<CredentialRecord>, LookupError>;
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphData {
    #[serde(default)]
    anfetokens: Vec<AnfeToken>,
    license_token: Option<LicenseToken>,
    #[serde(default)]
    share_proposal_datas: Vec<ShareProposalData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareProposalData {
    proposal_id: Option<String>,
    share_number_id: Option<String>,
    chypc_id: Option<String>,
    license_id: Option<String>,
    r_token_id: Option<String>,
    w_token_id: Option<String>,
    operator: Option<String>,
}

impl ShareProposalData {
    fn into_proposal(self, chain: &str) -> ShareProposal {
        ShareProposal {
            chain: chain.to_string(),
            proposal_id: self.proposal_id.unwrap_or_default(),
            share_number_id: self.share_number_id.unwrap_or_default(),
            chypc_id: self.chypc_id.unwrap_or_default(),
            license_id: self.license_id.unwrap_or_default(),
            r_token_id: self.r_token_id.unwrap_or_default(),
            w_token_id: self.w_token_id.unwrap_or_default(),
            operator: self.operator.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnfeToken {
    delegated_signer: Option<String>,
    owner: OwnerRef,
    license: Backing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseToken {
    owner: OwnerRef,
    #[serde(flatten)]
    backing: Backing,
}

#[derive(Debug, Deserialize)]
struct OwnerRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Backing {
    #[serde(default)]
    has_required_backing: bool,
    #[serde(default)]
    chypc_tokens_backing: Vec<BackingToken>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackingToken {
    token_id: String,
}

impl Backing {
    fn token_ids(&self) -> Vec<String> {
        self.chypc_tokens_backing.iter().map(|t| t.token_id.clone()).collect()
    }
}

fn build_query(credential: &CredentialId) -> String {
    format!(
        r#"{{
  anfetokens(where: {{tokenId: "{id}", isBurned: false}}) {{
    delegatedSigner
    owner {{ id }}
    license {{ hasRequiredBacking chypcTokensBacking {{ tokenId }} }}
  }}
  licenseToken(id: "{id}") {{
    owner {{ id }}
    hasRequiredBacking
    chypcTokensBacking {{ tokenId }}
  }}
}}"#,
        id = credential.as_str()
    )
}

fn build_operator_query(operator: &Account) -> String {
    format!(
        r#"{{
  shareProposalDatas(
    first: 1000, orderBy: proposalId,
    where: {{operator_contains: "{operator}"}}
  ) {{
    proposalId
    shareNumberId
    chypcId
    licenseId
    rTokenId
    wTokenId
    operator
  }}
}}"#,
        operator = operator.to_lower_hex()
    )
}

/// ANFE before License on one chain.
fn record_from(chain: &str, data: GraphData) -> Option<CredentialRecord> {
    if let Some(anfe) = data.anfetokens.into_iter().next() {
        return Some(CredentialRecord {
            kind: CredentialKind::Anfe,
            chain: chain.to_string(),
            owner: anfe.owner.id,
            delegated_signer: anfe.delegated_signer.filter(|s| !s.is_empty()),
            has_required_backing: anfe.license.has_required_backing,
            backing_tokens: anfe.license.token_ids(),
        });
    }
    data.license_token.map(|license| CredentialRecord {
        kind: CredentialKind::License,
        chain: chain.to_string(),
        owner: license.owner.id,
        delegated_signer: None,
        has_required_backing: license.backing.has_required_backing,
        backing_tokens: license.backing.token_ids(),
    })
}

pub struct SubgraphClient {
    client: reqwest::Client,
    endpoints: Vec<SubgraphEndpoint>,
    timeout: Duration,
}

impl SubgraphClient {
    pub fn new(endpoints: Vec<SubgraphEndpoint>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("hcn-interactor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LookupError::Query(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    async fn query(
        &self,
        endpoint: &SubgraphEndpoint,
        query: &str,
    ) -> Result<GraphData, LookupError> {
        debug!(chain = %endpoint.chain, url = %endpoint.url, "querying subgraph");
        let resp = self
            .client
            .post(&endpoint.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| LookupError::Query(format!("{}: {e}", endpoint.chain)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Query(format!("{} returned {status}", endpoint.chain)));
        }
        let body: GraphResponse = resp
            .json()
            .await
            .map_err(|e| {
                LookupError::Query(format!("{}: malformed response: {e}", endpoint.chain))
            })?;

        if let Some(err) = body.errors.first() {
            return Err(LookupError::Query(format!("{}: {}", endpoint.chain, err.message)));
        }
        Ok(body.data.unwrap_or_default())
    }

    /// Run `query` against every endpoint at once, results in endpoint order.
    async fn fan_out(&self, query: &str) -> Vec<Result<GraphData, LookupError>> {
        join_all(self.endpoints.iter().map(|ep| self.query(ep, query))).await
    }

    /// Share proposals naming `operator`, across all chains of the network.
    pub async fn share_proposals(
        &self,
        operator: &Account,
    ) -> Result<Vec<ShareProposal>, LookupError> {
        let results = self.fan_out(&build_operator_query(operator)).await;

        let mut proposals = Vec::new();
        let mut last_error = None;
        let mut answered = 0usize;
        for (endpoint, result) in self.endpoints.iter().zip(results) {
            match result {
                Ok(data) => {
                    answered += 1;
                    proposals.extend(
                        data.share_proposal_datas
                            .into_iter()
                            .map(|d| d.into_proposal(&endpoint.chain)),
                    );
                }
                Err(e) => {
                    warn!(chain = %endpoint.chain, error = %e, "subgraph query failed, skipping");
                    last_error = Some(e);
                }
            }
        }
        info!(operator = %operator, count = proposals.len(), "share proposals resolved");

        match (answered, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(proposals),
        }
    }
}

#[async_trait]
impl CredentialLookup for SubgraphClient {
    async fn lookup(
        &self,
        credential: &CredentialId,
    ) -> Result<Option<CredentialRecord>, LookupError> {
        let results = self.fan_out(&build_query(credential)).await;

        let mut last_error = None;
        let mut answered = 0usize;
        for (endpoint, result) in self.endpoints.iter().zip(results) {
            match result {
                Ok(data) => {
                    answered += 1;
                    if let Some(record) = record_from(&endpoint.chain, data) {
                        info!(
                            credential = %credential,
                            kind = %record.kind,
                            chain = %record.chain,
                            "credential resolved"
                        );
                        return Ok(Some(record));
                    }
                }
                Err(e) => {
                    warn!(chain = %endpoint.chain, error = %e, "subgraph query failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        match (answered, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(None),
        }
    }
}
