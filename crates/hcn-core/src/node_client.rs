//! Client for a node's Manager Mode HTTP API.
//!
//! `NodeApi` is the seam the orchestrator talks to; `HttpNodeClient` is the
//! reqwest implementation driven by a [`NodeApiSchema`]. Every request has
//! its own timeout and no method retries on its own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::NodeError;
use crate::payload::SignedAssignment;
use crate::retry::PollPolicy;
use crate::schema::{NodeApiSchema, StatusClass};
use crate::types::{
    check_reference, check_token, AssignmentResult, Confirmation, NodeIdentity, NodeUrl,
    RejectionReason,
};

/// Longest body excerpt carried into error details.
const MAX_DETAIL_LEN: usize = 200;

#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Handshake: node identity, optional nonce and network.
    async fn fetch_node_info(&self, node: &NodeUrl) -> Result<NodeIdentity, NodeError>;

    /// Submit a signed assignment once.
    async fn submit_assignment(
        &self,
        node: &NodeUrl,
        signed: &SignedAssignment,
    ) -> AssignmentResult;

    /// Read the status of a submitted assignment once.
    async fn check_status(&self, node: &NodeUrl, reference: &str) -> AssignmentResult;

    /// Whether the node exposes a status endpoint at all.
    fn supports_status(&self) -> bool;

    /// Re-check status until it settles or the budget runs out.
    ///
    /// An exhausted budget yields a retryable transport failure: the caller
    /// should re-check later, not resubmit.
    async fn poll_status(
        &self,
        node: &NodeUrl,
        reference: &str,
        policy: PollPolicy,
    ) -> AssignmentResult {
        if !self.supports_status() {
            return AssignmentResult::Accepted(Confirmation {
                reference: reference.to_string(),
                pending: false,
            });
        }

        let started = tokio::time::Instant::now();
        let mut checks = 0u32;
        loop {
            checks += 1;
            let result = self.check_status(node, reference).await;
            let settled = match &result {
                AssignmentResult::Accepted(c) => !c.pending,
                AssignmentResult::Rejected(_) => true,
                AssignmentResult::TransportFailure { retryable, detail } => {
                    if *retryable {
                        warn!(reference, checks, %detail, "status check failed");
                    }
                    !*retryable
                }
            };
            if settled {
                return result;
            }
            debug!(reference, checks, "assignment not settled yet");

            if started.elapsed() + policy.interval > policy.max_wait {
                return AssignmentResult::transient(format!(
                    "status still pending after {checks} check(s) over {:?}",
                    started.elapsed()
                ));
            }
            tokio::time::sleep(policy.interval).await;
        }
    }
}

/// Per-request timeouts for the HTTP client.
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    pub handshake_timeout: Duration,
    pub submit_timeout: Duration,
    pub status_timeout: Duration,
    pub user_agent: String,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            user_agent: format!("hcn-interactor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct HttpNodeClient {
    client: reqwest::Client,
    config: NodeClientConfig,
    schema: NodeApiSchema,
}

impl HttpNodeClient {
    pub fn new(config: NodeClientConfig, schema: NodeApiSchema) -> Result<Self, NodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| NodeError::Unreachable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            schema,
        })
    }

    pub fn schema(&self) -> &NodeApiSchema {
        &self.schema
    }

    /// JSON body for a submission, using the configured field names.
    pub fn request_body(&self, signed: &SignedAssignment) -> Value {
        let fields = &self.schema.request;
        let payload = signed.payload();
        let mut body = Map::new();
        body.insert(fields.version.clone(), Value::from(self.schema.version));
        body.insert(
            fields.message.clone(),
            Value::String(String::from_utf8_lossy(signed.message()).into_owned()),
        );
        body.insert(fields.signature.clone(), Value::String(signed.signature().to_hex()));
        body.insert(fields.signer.clone(), Value::String(signed.signer().to_checksum()));
        body.insert(
            fields.credential.clone(),
            Value::String(payload.credential.to_string()),
        );
        body.insert(
            fields.network.clone(),
            Value::String(payload.network.to_string()),
        );
        Value::Object(body)
    }

    /// Map a 2xx body to a result. `fallback_ref` is used when the node
    /// does not return a confirmation reference.
    fn classify_success(
        &self,
        status: StatusCode,
        body: &str,
        fallback_ref: &str,
    ) -> AssignmentResult {
        let Ok(Value::Object(json)) = serde_json::from_str::<Value>(body) else {
            return AssignmentResult::TransportFailure {
                retryable: false,
                detail: format!("node returned {status} with a non-JSON body: {}", excerpt(body)),
            };
        };
        let fields = &self.schema.response;

        let word_class = json
            .get(&fields.status)
            .and_then(Value::as_str)
            .map(|w| self.schema.status.classify(w));
        let flag = json.get(&fields.accepted).and_then(Value::as_bool);
        let reference = json
            .get(&fields.confirmation)
            .and_then(scalar_string)
            .unwrap_or_else(|| fallback_ref.to_string());

        match (word_class, flag) {
            (Some(StatusClass::Rejected), _) | (_, Some(false)) => {
                let reason = json
                    .get(&fields.reason)
                    .and_then(Value::as_str)
                    .or_else(|| json.get(&fields.status).and_then(Value::as_str))
                    .unwrap_or("rejected")
                    .to_string();
                AssignmentResult::Rejected(RejectionReason {
                    status: Some(status.as_u16()),
                    reason,
                })
            }
            (Some(StatusClass::Pending), _) => AssignmentResult::Accepted(Confirmation {
                reference,
                pending: true,
            }),
            (Some(StatusClass::Accepted), _) | (_, Some(true)) => {
                AssignmentResult::Accepted(Confirmation {
                    reference,
                    pending: false,
                })
            }
            _ => AssignmentResult::TransportFailure {
                retryable: false,
                detail: format!("node returned {status} without an acceptance marker"),
            },
        }
    }

    fn classify(&self, status: StatusCode, body: &str, fallback_ref: &str) -> AssignmentResult {
        if status.is_success() {
            self.classify_success(status, body, fallback_ref)
        } else if status.is_client_error() {
            AssignmentResult::Rejected(RejectionReason {
                status: Some(status.as_u16()),
                reason: rejection_reason(status, body, &self.schema.response.reason),
            })
        } else if status.is_server_error() {
            AssignmentResult::transient(format!("node returned {status}: {}", excerpt(body)))
        } else {
            AssignmentResult::TransportFailure {
                retryable: false,
                detail: format!("unexpected HTTP status {status}"),
            }
        }
    }
}

#[async_trait]
impl NodeApi for HttpNodeClient {
    async fn fetch_node_info(&self, node: &NodeUrl) -> Result<NodeIdentity, NodeError> {
        let url = node.endpoint(&self.schema.info_path);
        debug!(%url, "fetching node info");

        let resp = self
            .client
            .get(&url)
            .timeout(self.config.handshake_timeout)
            .send()
            .await
            .map_err(|e| NodeError::Unreachable(describe(&e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| NodeError::Unreachable(describe(&e)))?;

        if status.is_server_error() {
            return Err(NodeError::Unreachable(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            return Err(NodeError::InvalidResponse(format!(
                "{url} returned {status}: {}",
                excerpt(&body)
            )));
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| NodeError::InvalidResponse(format!("node info is not JSON: {e}")))?;
        let Value::Object(json) = json else {
            return Err(NodeError::InvalidResponse("node info is not a JSON object".into()));
        };
        let fields = &self.schema.response;

        let node_id = json
            .get(&fields.node_id)
            .and_then(scalar_string)
            .unwrap_or_else(|| node.authority());
        check_token("node id", &node_id).map_err(NodeError::InvalidResponse)?;

        let nonce = json.get(&fields.nonce).and_then(scalar_string);
        if let Some(nonce) = &nonce {
            check_token("nonce", nonce).map_err(NodeError::InvalidResponse)?;
        }
        let network = json
            .get(&fields.network)
            .and_then(Value::as_str)
            .map(str::to_string);

        debug!(%node_id, has_nonce = nonce.is_some(), network = ?network, "node identified");
        Ok(NodeIdentity {
            node_id,
            nonce,
            network,
        })
    }

    async fn submit_assignment(
        &self,
        node: &NodeUrl,
        signed: &SignedAssignment,
    ) -> AssignmentResult {
        let url = node.endpoint(&self.schema.assign_path);
        let body = match serde_json::to_vec(&self.request_body(signed)) {
            Ok(b) => b,
            Err(e) => {
                return AssignmentResult::TransportFailure {
                    retryable: false,
                    detail: format!("failed to encode request: {e}"),
                }
            }
        };
        debug!(%url, bytes = body.len(), "submitting assignment");

        let resp = match self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, &self.schema.content_type)
            .timeout(self.config.submit_timeout)
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return AssignmentResult::transient(describe(&e)),
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => return AssignmentResult::transient(describe(&e)),
        };
        debug!(%status, "submission response");
        self.classify(status, &text, &signed.digest_hex())
    }

    async fn check_status(&self, node: &NodeUrl, reference: &str) -> AssignmentResult {
        if let Err(detail) = check_reference(reference) {
            return AssignmentResult::TransportFailure {
                retryable: false,
                detail,
            };
        }
        let Some(path) = self.schema.status_path_for(reference) else {
            return AssignmentResult::Accepted(Confirmation {
                reference: reference.to_string(),
                pending: false,
            });
        };
        let url = node.endpoint(&path);

        let resp = match self
            .client
            .get(&url)
            .timeout(self.config.status_timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return AssignmentResult::transient(describe(&e)),
        };
        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => return AssignmentResult::transient(describe(&e)),
        };
        debug!(%url, %status, "status response");
        if status_route_missing(status) {
            // Missing route or unknown reference; neither settles the assignment.
            warn!(%url, %status, "status endpoint not available");
            return AssignmentResult::transient(format!("status check returned {status}"));
        }
        self.classify(status, &text, reference)
    }

    fn supports_status(&self) -> bool {
        self.schema.has_status_endpoint()
    }
}

fn status_route_missing(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    )
}

/// Reason for a 4xx: JSON reason field, else body text, else reason phrase.
fn rejection_reason(status: StatusCode, body: &str, reason_field: &str) -> String {
    if let Ok(Value::Object(json)) = serde_json::from_str::<Value>(body) {
        if let Some(reason) = json.get(reason_field).and_then(Value::as_str) {
            if !reason.trim().is_empty() {
                return reason.trim().to_string();
            }
        }
    }
    let text = body.trim();
    if !text.is_empty() {
        return excerpt(text);
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_DETAIL_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_DETAIL_LEN).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpNodeClient {
        HttpNodeClient::new(NodeClientConfig::default(), NodeApiSchema::default()).unwrap()
    }

    #[test]
    fn test_rejection_reason_sources() {
        assert_eq!(
            rejection_reason(StatusCode::FORBIDDEN, r#"{"reason":"already assigned"}"#, "reason"),
            "already assigned"
        );
        assert_eq!(
            rejection_reason(StatusCode::FORBIDDEN, "  already assigned\n", "reason"),
            "already assigned"
        );
        assert_eq!(rejection_reason(StatusCode::FORBIDDEN, "", "reason"), "Forbidden");
        assert_eq!(
            rejection_reason(StatusCode::BAD_REQUEST, r#"{"error":"x"}"#, "reason"),
            r#"{"error":"x"}"#
        );
    }

    #[test]
    fn test_classify_accepted_and_pending() {
        let c = client();
        let r = c.classify(StatusCode::OK, r#"{"accepted":true,"confirmation":"abc"}"#, "fb");
        assert_eq!(
            r,
            AssignmentResult::Accepted(Confirmation {
                reference: "abc".into(),
                pending: false
            })
        );

        let r = c.classify(StatusCode::ACCEPTED, r#"{"status":"pending"}"#, "fb");
        assert_eq!(
            r,
            AssignmentResult::Accepted(Confirmation {
                reference: "fb".into(),
                pending: true
            })
        );
    }

    #[test]
    fn test_classify_success_without_marker() {
        let c = client();
        let r = c.classify(StatusCode::OK, r#"{"hello":"world"}"#, "fb");
        assert!(matches!(r, AssignmentResult::TransportFailure { retryable: false, .. }));

        let r = c.classify(StatusCode::OK, "<html>", "fb");
        assert!(matches!(r, AssignmentResult::TransportFailure { retryable: false, .. }));
    }

    #[test]
    fn test_classify_rejections_and_server_errors() {
        let c = client();
        let r = c.classify(StatusCode::FORBIDDEN, r#"{"reason":"already assigned"}"#, "fb");
        assert_eq!(
            r,
            AssignmentResult::Rejected(RejectionReason {
                status: Some(403),
                reason: "already assigned".into()
            })
        );

        let r = c.classify(StatusCode::OK, r#"{"accepted":false,"reason":"bad signature"}"#, "fb");
        assert!(matches!(r, AssignmentResult::Rejected(ref why) if why.reason == "bad signature"));

        assert!(c.classify(StatusCode::SERVICE_UNAVAILABLE, "", "fb").is_retryable());
        assert!(!c.classify(StatusCode::MOVED_PERMANENTLY, "", "fb").is_retryable());
    }

    #[test]
    fn test_missing_status_route_statuses() {
        assert!(status_route_missing(StatusCode::NOT_FOUND));
        assert!(status_route_missing(StatusCode::METHOD_NOT_ALLOWED));
        assert!(status_route_missing(StatusCode::NOT_IMPLEMENTED));
        assert!(!status_route_missing(StatusCode::FORBIDDEN));
        assert!(!status_route_missing(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_unsafe_reference_never_requested() {
        let c = client();
        let node: NodeUrl = "http://127.0.0.1:9".parse().unwrap();
        for reference in ["../admin", "a/b", "x?y=1"] {
            let r = c.check_status(&node, reference).await;
            assert!(
                matches!(
                    r,
                    AssignmentResult::TransportFailure { retryable: false, ref detail }
                        if detail.contains("reference")
                ),
                "{reference}: {r:?}"
            );
        }
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), MAX_DETAIL_LEN + 3);
        assert_eq!(excerpt(" short "), "short");
    }
}
