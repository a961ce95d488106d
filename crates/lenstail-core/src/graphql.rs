use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification code the server attaches to auth failures.
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";

/// Outbound GraphQL request body (HTTP queries and subscribe payloads share
/// this shape).
#[derive(Clone, Debug, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Value,
}

/// A single error from a GraphQL response or subscription `error` frame.
#[derive(Clone, Debug, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    /// The `extensions.code` classification, when present.
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
    }

    /// Whether this error means the bearer token is no longer accepted.
    pub fn is_auth(&self) -> bool {
        self.code() == Some(UNAUTHENTICATED)
    }
}

/// Standard GraphQL-over-HTTP response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}
