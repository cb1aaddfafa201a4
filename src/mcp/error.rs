//! Error taxonomy and wire mapping.

use serde_json::json;

use super::protocol::JsonRpcError;
use crate::core::RetryError;
use crate::maas::BackendError;

/// JSON-RPC error codes.
pub mod codes {
    /// Malformed JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method or tool
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Malformed parameters of a built-in method
    pub const INVALID_PARAMS: i32 = -32602;
    /// Unexpected server-side condition
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Tool or upstream failure
    pub const SERVER_ERROR: i32 = -32000;
}

/// Result type for dispatch operations.
pub type McpResult<T> = Result<T, McpError>;

/// Everything that can go wrong between receiving a request and answering it.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid resource URI: {0}")]
    InvalidUri(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Internal error")]
    Internal { correlation_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    /// Parameter validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Missing required field.
    pub fn missing_field(name: &str) -> Self {
        Self::Validation(format!("missing required field '{name}'"))
    }

    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => codes::PARSE_ERROR,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Internal { .. } | Self::Serialization(_) => codes::INTERNAL_ERROR,
            Self::Validation(_)
            | Self::Upstream(_)
            | Self::NotFound(_)
            | Self::ResourceNotFound(_)
            | Self::InvalidUri(_)
            | Self::Canceled => codes::SERVER_ERROR,
        }
    }

    /// Whether this error is an application-level failure rather than a
    /// protocol failure.
    pub fn is_tool_error(&self) -> bool {
        self.code() == codes::SERVER_ERROR
    }

    /// Message safe to show to the caller.
    ///
    /// Internal failures never leak their cause; the correlation id is
    /// attached instead.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { correlation_id } => {
                format!("Internal error (correlation_id: {correlation_id})")
            }
            Self::Serialization(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert into a JSON-RPC error object.
    pub fn to_jsonrpc(&self, correlation_id: &str) -> JsonRpcError {
        let message = match self {
            Self::Internal { .. } | Self::Serialization(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        JsonRpcError { code: self.code(), message, data: Some(json!({ "correlation_id": correlation_id })) }
    }
}

impl From<RetryError<BackendError>> for McpError {
    fn from(error: RetryError<BackendError>) -> Self {
        match error {
            RetryError::Canceled { .. } => Self::Canceled,
            RetryError::Permanent { source: BackendError::NotFound(what), .. } => Self::NotFound(what),
            RetryError::Permanent { source: BackendError::InvalidRequest(message), .. } => {
                Self::Validation(message)
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(McpError::Parse("x".into()).code(), -32700);
        assert_eq!(McpError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(McpError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(McpError::Internal { correlation_id: "c".into() }.code(), -32603);
        assert_eq!(McpError::missing_field("name").code(), -32000);
        assert!(McpError::Upstream("x".into()).is_tool_error());
        assert!(!McpError::MethodNotFound("x".into()).is_tool_error());
    }

    #[test]
    fn test_missing_field_message() {
        assert_eq!(McpError::missing_field("name").to_string(), "missing required field 'name'");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = McpError::Internal { correlation_id: "abc".into() };
        let rpc = err.to_jsonrpc("abc");
        assert_eq!(rpc.message, "Internal error");
        assert_eq!(rpc.data.unwrap()["correlation_id"], "abc");
        assert!(err.public_message().contains("abc"));
    }

    #[test]
    fn test_from_retry_error() {
        let exhausted = RetryError::Exhausted {
            attempts: 3,
            source: BackendError::Status { status: 503, body: "down".into() },
        };
        let err = McpError::from(exhausted);
        assert!(matches!(err, McpError::Upstream(_)));
        assert!(err.to_string().contains("failed after 3 attempts"));

        let missing = RetryError::Permanent { attempt: 1, source: BackendError::NotFound("machine x".into()) };
        assert!(matches!(McpError::from(missing), McpError::NotFound(_)));

        assert!(matches!(McpError::from(RetryError::<BackendError>::Canceled { attempts: 1 }), McpError::Canceled));
    }
}
