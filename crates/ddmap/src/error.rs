//! Error taxonomy surfaced by the mapping engine and the reconciler.

use thiserror::Error;

/// Errors produced while validating, mapping or reconciling a resource.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("{kind} already exists (HTTP {status}): {message}")]
    AlreadyExists {
        kind: String,
        status: u16,
        message: String,
    },

    #[error("{kind} '{id}' was created but did not become visible within {waited_secs}s")]
    EventualConsistencyTimeout {
        kind: String,
        id: String,
        waited_secs: u64,
    },

    #[error("Transport error for {kind} '{id}' (HTTP {status}): {message}")]
    Transport {
        kind: String,
        id: String,
        status: u16,
        message: String,
    },

    #[error("{kind} '{id}' rejected by server (HTTP {status}): {message}")]
    Semantic {
        kind: String,
        id: String,
        status: u16,
        message: String,
    },

    #[error("{message}")]
    DriftSignal {
        kind: String,
        id: String,
        message: String,
    },

    #[error("Failed to serialize or parse payload: {0}")]
    Serialization(String),

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl EngineError {
    /// Returns true if the error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transport { .. })
    }

    /// Returns true for a 404 from the server.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// HTTP status attached to the error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::NotFound { .. } => Some(404),
            EngineError::AlreadyExists { status, .. }
            | EngineError::Transport { status, .. }
            | EngineError::Semantic { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classifies a non-success HTTP status into the matching error variant.
///
/// `status == 0` denotes a network-level failure with no response.
pub fn classify_status(kind: &str, id: &str, status: u16, body: &[u8]) -> EngineError {
    let message = upstream_message(body);
    match status {
        404 => EngineError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        },
        409 => EngineError::AlreadyExists {
            kind: kind.to_string(),
            status,
            message,
        },
        0 | 429 | 500..=599 => EngineError::Transport {
            kind: kind.to_string(),
            id: id.to_string(),
            status,
            message,
        },
        _ => EngineError::Semantic {
            kind: kind.to_string(),
            id: id.to_string(),
            status,
            message,
        },
    }
}

/// Extracts a readable message from a Datadog error body.
///
/// Datadog answers `{"errors": ["..."]}` on v1 and v2 endpoints; anything else is
/// returned verbatim.
fn upstream_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(errors) = value.get("errors").and_then(|e| e.as_array()) {
            let parts: Vec<String> = errors
                .iter()
                .map(|e| match e {
                    serde_json::Value::String(s) => s.clone(),
                    other => other
                        .get("detail")
                        .or_else(|| other.get("title"))
                        .and_then(|d| d.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                })
                .collect();
            return parts.join(", ");
        }
    }
    String::from_utf8_lossy(body).trim().to_string()
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_status("dashboard", "abc", 404, b"");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_classify_conflict() {
        let err = classify_status("user", "", 409, br#"{"errors":["User already exists"]}"#);
        match err {
            EngineError::AlreadyExists { message, .. } => {
                assert_eq!(message, "User already exists")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_rate_limit_is_retryable() {
        assert!(classify_status("dashboard", "abc", 429, b"").is_retryable());
        assert!(classify_status("dashboard", "abc", 503, b"").is_retryable());
        assert!(classify_status("dashboard", "abc", 0, b"connection reset").is_retryable());
    }

    #[test]
    fn test_classify_semantic_is_fatal() {
        let err = classify_status(
            "dashboard",
            "abc",
            400,
            br#"{"errors":[{"title":"Bad Request","detail":"invalid widget"}]}"#,
        );
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("invalid widget"));
    }

    #[test]
    fn test_drift_signal_message_is_verbatim() {
        let err = EngineError::DriftSignal {
            kind: "cloud_configuration_rule".into(),
            id: "X".into(),
            message: "Rule with id X is not a cloud_configuration rule".into(),
        };
        assert_eq!(
            err.to_string(),
            "Rule with id X is not a cloud_configuration rule"
        );
    }
}
