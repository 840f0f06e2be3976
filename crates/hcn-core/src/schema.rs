//! Node Manager Mode API conventions, kept as versioned configuration.
//!
//! Paths, field names and status words vary between node releases, so they
//! live in `[node_api]` rather than in code.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the confirmation reference in `status_path`.
pub const REF_PLACEHOLDER: &str = "{ref}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeApiSchema {
    /// Schema version, sent as the `version` request field.
    pub version: u32,
    pub info_path: String,
    pub assign_path: String,
    /// Status endpoint with a `{ref}` placeholder. Empty means the node
    /// settles synchronously and an accepted submission is final.
    pub status_path: String,
    pub content_type: String,
    pub request: RequestFields,
    pub response: ResponseFields,
    pub status: StatusWords,
}

impl Default for NodeApiSchema {
    fn default() -> Self {
        Self {
            version: 1,
            info_path: "/info".to_string(),
            assign_path: "/manager/assign".to_string(),
            status_path: "/manager/assignment/{ref}".to_string(),
            content_type: "application/json".to_string(),
            request: RequestFields::default(),
            response: ResponseFields::default(),
            status: StatusWords::default(),
        }
    }
}

impl NodeApiSchema {
    pub fn has_status_endpoint(&self) -> bool {
        !self.status_path.is_empty()
    }

    pub fn status_path_for(&self, reference: &str) -> Option<String> {
        self.has_status_endpoint()
            .then(|| self.status_path.replace(REF_PLACEHOLDER, reference))
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [("info_path", &self.info_path), ("assign_path", &self.assign_path)] {
            if !path.starts_with('/') {
                return Err(format!("node_api.{name} must start with '/'"));
            }
        }
        if self.has_status_endpoint() {
            let path = &self.status_path;
            if !path.starts_with('/') {
                return Err("node_api.status_path must start with '/'".to_string());
            }
            if !path.contains(REF_PLACEHOLDER) {
                return Err(format!("node_api.status_path must contain {REF_PLACEHOLDER}"));
            }
        }
        if self.content_type.trim().is_empty() {
            return Err("node_api.content_type must not be empty".to_string());
        }
        if self.status.accepted.is_empty() {
            return Err("node_api.status.accepted must list at least one word".to_string());
        }
        Ok(())
    }
}

/// Field names of the submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFields {
    pub version: String,
    pub message: String,
    pub signature: String,
    pub signer: String,
    pub credential: String,
    pub network: String,
}

impl Default for RequestFields {
    fn default() -> Self {
        Self {
            version: "version".to_string(),
            message: "message".to_string(),
            signature: "signature".to_string(),
            signer: "address".to_string(),
            credential: "license_anfe".to_string(),
            network: "network".to_string(),
        }
    }
}

/// Field names read from node responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseFields {
    pub node_id: String,
    pub nonce: String,
    pub network: String,
    /// Boolean acceptance marker.
    pub accepted: String,
    /// Status word, matched against `StatusWords`.
    pub status: String,
    pub confirmation: String,
    pub reason: String,
}

impl Default for ResponseFields {
    fn default() -> Self {
        Self {
            node_id: "node_id".to_string(),
            nonce: "nonce".to_string(),
            network: "network".to_string(),
            accepted: "accepted".to_string(),
            status: "status".to_string(),
            confirmation: "confirmation".to_string(),
            reason: "reason".to_string(),
        }
    }
}

/// Status words, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusWords {
    pub accepted: Vec<String>,
    pub pending: Vec<String>,
    pub rejected: Vec<String>,
}

impl Default for StatusWords {
    fn default() -> Self {
        Self {
            accepted: vec!["accepted".into(), "assigned".into(), "ok".into(), "success".into()],
            pending: vec!["pending".into(), "processing".into(), "queued".into()],
            rejected: vec!["rejected".into(), "denied".into(), "failed".into()],
        }
    }
}

/// Classification of a status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Accepted,
    Pending,
    Rejected,
    Unknown,
}

impl StatusWords {
    pub fn classify(&self, word: &str) -> StatusClass {
        let matches = |list: &[String]| list.iter().any(|w| w.eq_ignore_ascii_case(word.trim()));
        if matches(&self.pending) {
            StatusClass::Pending
        } else if matches(&self.accepted) {
            StatusClass::Accepted
        } else if matches(&self.rejected) {
            StatusClass::Rejected
        } else {
            StatusClass::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = NodeApiSchema::default();
        assert!(schema.validate().is_ok());
        assert_eq!(
            schema.status_path_for("abc").as_deref(),
            Some("/manager/assignment/abc")
        );
    }

    #[test]
    fn test_status_path_requires_placeholder() {
        let schema = NodeApiSchema {
            status_path: "/manager/assignment".into(),
            ..Default::default()
        };
        assert!(schema.validate().is_err());

        let schema = NodeApiSchema {
            status_path: String::new(),
            ..Default::default()
        };
        assert!(schema.validate().is_ok());
        assert!(schema.status_path_for("abc").is_none());
    }

    #[test]
    fn test_relative_path_rejected() {
        let schema = NodeApiSchema {
            assign_path: "manager/assign".into(),
            ..Default::default()
        };
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_status_classification() {
        let words = StatusWords::default();
        assert_eq!(words.classify("ACCEPTED"), StatusClass::Accepted);
        assert_eq!(words.classify("pending"), StatusClass::Pending);
        assert_eq!(words.classify(" denied "), StatusClass::Rejected);
        assert_eq!(words.classify("weird"), StatusClass::Unknown);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let schema: NodeApiSchema = serde_json::from_str(
            r#"{"assign_path": "/v2/assign", "response": {"reason": "error"}}"#,
        )
        .unwrap();
        assert_eq!(schema.assign_path, "/v2/assign");
        assert_eq!(schema.info_path, "/info");
        assert_eq!(schema.response.reason, "error");
        assert_eq!(schema.response.node_id, "node_id");
    }
}
