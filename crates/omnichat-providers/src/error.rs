//! Error taxonomy shared by every adapter.

use thiserror::Error;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Provider-independent failure of a chat call.
///
/// Adapters never retry and never swallow failures; every kind reaches the
/// caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Missing, empty or rejected API key.
    #[error("Invalid credential")]
    InvalidCredential,

    /// HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Any other non-success status.
    #[error("Server error: {status}{}", detail_suffix(.message))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// DNS, TLS, connection reset, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// A success response without the fields the adapter needs.
    #[error("Response is missing expected content")]
    InvalidResponseShape,

    /// A body that does not parse at all.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// An explicit error event sent inside a stream.
    #[error("Streaming error: {0}")]
    StreamingProtocol(String),
}

impl ServiceError {
    /// Create a server error.
    pub fn server(status: u16, message: Option<String>) -> Self {
        Self::Server { status, message }
    }

    /// Create a network error.
    pub fn network(cause: impl Into<String>) -> Self {
        Self::Network(cause.into())
    }

    /// Create a streaming protocol error.
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::StreamingProtocol(message.into())
    }

    /// One human-readable sentence per kind, suitable for the chat UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredential => {
                "Invalid API key. Please check your key in Settings.".to_string()
            }
            Self::RateLimited => "Rate limited. Please wait a moment and try again.".to_string(),
            Self::Server {
                status,
                message: Some(message),
            } => format!("The provider returned an error ({status}): {message}"),
            Self::Server {
                status,
                message: None,
            } => format!("The provider returned an error ({status})."),
            Self::Network(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            Self::InvalidResponseShape => "The provider returned an empty response.".to_string(),
            Self::Decoding(_) => "The provider's response could not be read.".to_string(),
            Self::StreamingProtocol(message) => format!("The response stream failed: {message}"),
        }
    }
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" - {m}"))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}
