use thiserror::Error;

/// Errors reported by the remote API collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("{entity_type} not found: {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
