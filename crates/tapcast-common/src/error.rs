//! Common error types for Tapcast.

use thiserror::Error;

/// Result type alias using Tapcast's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Tapcast operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket read/write, connect)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Protocol error (unexpected frame, invalid field, bad state for an operation)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Negotiation failed (description or candidate rejected by the media stack)
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// A local platform capability failed (capture, input injection)
    #[error("capability error: {0}")]
    Capability(String),

    /// The underlying transport or data channel is closed
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a negotiation error from any displayable type.
    pub fn negotiation(msg: impl std::fmt::Display) -> Self {
        Self::Negotiation(msg.to_string())
    }

    /// Create a capability error from any displayable type.
    pub fn capability(msg: impl std::fmt::Display) -> Self {
        Self::Capability(msg.to_string())
    }

    /// Create a channel-closed error from any displayable type.
    pub fn channel_closed(msg: impl std::fmt::Display) -> Self {
        Self::ChannelClosed(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }
}
