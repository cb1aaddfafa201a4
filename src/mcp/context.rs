//! Per-request context.

use tokio_util::sync::CancellationToken;

/// Which adapter received the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Line-delimited stdin/stdout
    Stdio,
    /// HTTP POST
    Http,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => f.write_str("stdio"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// Context handed to every tool and resource handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation ID echoed in logs and error payloads
    pub correlation_id: String,
    /// Canceled on shutdown or when the caller goes away
    pub cancel: CancellationToken,
    /// Receiving transport
    pub transport: Transport,
}

impl RequestContext {
    /// Fresh context with a generated correlation ID.
    pub fn new(transport: Transport) -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            transport,
        }
    }

    /// Use a caller-supplied correlation ID.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Tie the request to a parent cancellation token.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Whether the request has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
