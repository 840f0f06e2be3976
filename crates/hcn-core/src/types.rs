//! Validated inputs and value types shared across the assignment flow.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use crate::errors::InputError;

/// Longest decimal rendering of a uint256 token id.
const MAX_CREDENTIAL_DIGITS: usize = 78;

/// Longest node id or nonce accepted from a node.
pub const MAX_TOKEN_LEN: usize = 256;

/// License / ANFE token id as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CredentialId {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InputError::Credential("credential id is empty".into()));
        }
        if s.len() > MAX_CREDENTIAL_DIGITS {
            return Err(InputError::Credential(format!(
                "credential id has {} digits, maximum is {MAX_CREDENTIAL_DIGITS}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InputError::Credential(format!(
                "credential id '{s}' must be a decimal number"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base URL of a node's HTTP management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUrl(Url);

impl NodeUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// `host[:port]`, used as node identity when the node does not supply one.
    pub fn authority(&self) -> String {
        let host = self.0.host_str().unwrap_or_default();
        match self.0.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Join an API path onto the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl FromStr for NodeUrl {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| InputError::NodeUrl(format!("{s}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(InputError::NodeUrl(format!(
                "{s}: scheme must be http or https"
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(InputError::NodeUrl(format!("{s}: missing host")));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(InputError::NodeUrl(format!(
                "{s}: base URL must not carry a query or fragment"
            )));
        }
        Ok(Self(url))
    }
}

impl fmt::Display for NodeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

/// Identity and freshness material returned by the node handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeIdentity {
    pub node_id: String,
    /// Server-issued nonce, when the node mandates one.
    pub nonce: Option<String>,
    /// Network the node claims to run on.
    pub network: Option<String>,
}

/// Where a freshness nonce came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessSource {
    Server,
    Local,
}

/// Single-use replay protection bound into the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Freshness {
    pub nonce: String,
    pub timestamp_ms: i64,
    pub source: FreshnessSource,
}

impl Freshness {
    /// Generate a random 16-byte nonce stamped with the current time.
    pub fn local() -> Result<Self, InputError> {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| InputError::Freshness(format!("rng unavailable: {e}")))?;
        Ok(Self {
            nonce: hex::encode(bytes),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source: FreshnessSource::Local,
        })
    }

    /// Wrap a nonce issued by the node.
    pub fn server(nonce: &str) -> Result<Self, InputError> {
        check_token("nonce", nonce).map_err(InputError::Freshness)?;
        Ok(Self {
            nonce: nonce.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source: FreshnessSource::Server,
        })
    }

    /// Prefer the node's nonce, otherwise generate one.
    pub fn for_node(node: &NodeIdentity) -> Result<Self, InputError> {
        match node.nonce.as_deref() {
            Some(nonce) => Self::server(nonce),
            None => Self::local(),
        }
    }
}

/// Check a node-supplied token for use in the canonical payload.
pub fn check_token(what: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{what} is empty"));
    }
    if value.len() > MAX_TOKEN_LEN {
        return Err(format!("{what} longer than {MAX_TOKEN_LEN} bytes"));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(format!("{what} contains whitespace or control characters"));
    }
    Ok(())
}

/// Check a confirmation reference before it is placed in a URL path.
///
/// Only unreserved URL characters are allowed, so the reference always
/// stays a single path segment.
pub fn check_reference(reference: &str) -> Result<(), String> {
    check_token("confirmation reference", reference)?;
    if reference == "." || reference == ".." {
        return Err("confirmation reference is a relative path segment".to_string());
    }
    if let Some(c) = reference
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')))
    {
        return Err(format!("confirmation reference contains {c:?}"));
    }
    Ok(())
}

/// Node acknowledgement of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub reference: String,
    /// The node accepted the request but has not settled it yet.
    pub pending: bool,
}

/// Node-side denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReason {
    pub status: Option<u16>,
    pub reason: String,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// Classified outcome of one submission or status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentResult {
    Accepted(Confirmation),
    Rejected(RejectionReason),
    TransportFailure { retryable: bool, detail: String },
}

impl AssignmentResult {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self::TransportFailure {
            retryable: true,
            detail: detail.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure { retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_must_be_one_path_segment() {
        assert!(check_reference("ref-1").is_ok());
        assert!(check_reference("0xAbC123_x.y~z").is_ok());
        assert!(check_reference("").is_err());
        assert!(check_reference("..").is_err());
        assert!(check_reference("../admin").is_err());
        assert!(check_reference("a/b").is_err());
        assert!(check_reference("a?b=c").is_err());
        assert!(check_reference("a#b").is_err());
        assert!(check_reference("a%2Fb").is_err());
    }

    #[test]
    fn test_credential_id_validation() {
        assert_eq!(
            "4649559795958260".parse::<CredentialId>().unwrap().as_str(),
            "4649559795958260"
        );
        assert!("".parse::<CredentialId>().is_err());
        assert!("12a4".parse::<CredentialId>().is_err());
        assert!("-12".parse::<CredentialId>().is_err());
        assert!(" 12".parse::<CredentialId>().is_err());
        assert!("1".repeat(79).parse::<CredentialId>().is_err());
        assert!("1".repeat(78).parse::<CredentialId>().is_ok());
    }

    #[test]
    fn test_node_url_validation() {
        let url: NodeUrl = "http://node.example:8080".parse().unwrap();
        assert_eq!(url.authority(), "node.example:8080");
        assert_eq!(url.to_string(), "http://node.example:8080");

        let url: NodeUrl = "https://node.example".parse().unwrap();
        assert_eq!(url.authority(), "node.example");

        assert!("ftp://node.example".parse::<NodeUrl>().is_err());
        assert!("node.example:8080".parse::<NodeUrl>().is_err());
        assert!("http://node.example/?x=1".parse::<NodeUrl>().is_err());
        assert!("not a url".parse::<NodeUrl>().is_err());
    }

    #[test]
    fn test_node_url_endpoint_join() {
        let url: NodeUrl = "http://node.example:8080".parse().unwrap();
        assert_eq!(url.endpoint("/info"), "http://node.example:8080/info");

        let url: NodeUrl = "http://node.example/api/".parse().unwrap();
        assert_eq!(url.endpoint("/manager/assign"), "http://node.example/api/manager/assign");
    }

    #[test]
    fn test_local_freshness_is_unique() {
        let a = Freshness::local().unwrap();
        let b = Freshness::local().unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), 32);
        assert_eq!(a.source, FreshnessSource::Local);
    }

    #[test]
    fn test_server_freshness_preferred() {
        let node = NodeIdentity {
            node_id: "node-1".into(),
            nonce: Some("abc123".into()),
            network: None,
        };
        let f = Freshness::for_node(&node).unwrap();
        assert_eq!(f.nonce, "abc123");
        assert_eq!(f.source, FreshnessSource::Server);

        assert!(Freshness::server("bad nonce").is_err());
        assert!(Freshness::server("").is_err());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AssignmentResult::transient("503").is_retryable());
        assert!(!AssignmentResult::TransportFailure {
            retryable: false,
            detail: "bad".into()
        }
        .is_retryable());
        assert!(!AssignmentResult::Rejected(RejectionReason {
            status: Some(403),
            reason: "already assigned".into()
        })
        .is_retryable());
    }
}
