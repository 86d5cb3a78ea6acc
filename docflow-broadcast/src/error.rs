//! Error types for the broadcast layer.

use thiserror::Error;

/// Result type for broadcast operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Errors that can occur while sending or receiving broadcasts.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// An inbound message is not a valid envelope. The stream keeps going.
    #[error("failed to decode message on {channel}: {reason}")]
    Decode { channel: String, reason: String },

    /// The channel was closed.
    #[error("broadcast channel {0} is closed")]
    Closed(String),

    /// The platform primitive refused to open or post.
    #[error("broadcast primitive error: {0}")]
    Primitive(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
