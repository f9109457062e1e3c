use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push server returned {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse push server response from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid push client configuration: {0}")]
    Config(String),
}

impl PushError {
    /// Transport failures, 5xx and 429 are worth another attempt; everything
    /// else means the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            PushError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PushError::Status { status, .. } => *status >= 500 || *status == 429,
            PushError::Parse { .. } | PushError::Config(_) => false,
        }
    }
}
