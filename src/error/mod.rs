//! Error types for voxbridge.

use thiserror::Error;

/// Primary error type for all bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Microphone access denied: {0}")]
    MediaAccessDenied(String),

    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution error: {name}: {message}")]
    ToolExecution { name: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BridgeError {
    /// Create a tool execution error.
    pub fn tool_execution(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether a failed `start()` may succeed on a plain retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CredentialUnavailable(_) | Self::NegotiationFailed(_) | Self::Network(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BridgeError>;
