//! Error types for the lifeline RPC layer

use crate::operation::OperationKey;

/// Errors that can occur in the lifeline RPC layer
#[derive(Debug, thiserror::Error)]
pub enum LifelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A live request failed at the network or protocol level
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A live response arrived but was not well-formed structured data
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No fallback available for '{0}'")]
    NoFallbackAvailable(OperationKey),

    /// A live mutation failed; the message is already normalized for display
    #[error("{message}")]
    Mutation {
        operation: OperationKey,
        message: String,
    },

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LifelineError {
    /// Message suitable for showing to a user: the underlying cause without
    /// the category prefix. Never empty.
    pub fn user_message(&self) -> String {
        let message = match self {
            LifelineError::Config(msg)
            | LifelineError::Http(msg)
            | LifelineError::Decode(msg)
            | LifelineError::Notifier(msg) => msg.clone(),
            LifelineError::Mutation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let trimmed = message.trim();
        if trimmed.is_empty() {
            "Unknown error".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Result type alias for lifeline operations
pub type Result<T> = std::result::Result<T, LifelineError>;
