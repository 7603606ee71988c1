//! Error types for the Paddock environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Send failed (inbox full, bus shut down, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Target agent is not registered on the bus
    #[error("Agent unreachable: {0}")]
    NodeUnreachable(String),

    /// Payload serialization failed before sending
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// No envelope arrived within the bound
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The local inbox was closed (shutdown)
    #[error("Inbox closed")]
    ChannelClosed,
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Creates an unreachable error.
    pub fn unreachable(node: impl std::fmt::Display) -> Self {
        Self::NodeUnreachable(node.to_string())
    }

    /// Returns true if this is a receive timeout (an expected outcome, not a fault).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
