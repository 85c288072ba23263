//! Error types for the relay
//!
//! Splits errors into two families: `RelayError` for fatal/internal faults
//! and `Reject` for client-facing protocol rejections. Uses thiserror for
//! ergonomic error definitions.

use thiserror::Error;

/// Internal and transport-level errors
///
/// These are operator-facing: they end a connection or a background loop
/// and are logged, never sent to clients verbatim.
#[derive(Debug, Error)]
pub enum RelayError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// UDP discovery failure; terminates only the discovery loop
    #[error("Discovery fault: {0}")]
    Discovery(String),
}

/// Client-facing protocol rejection
///
/// Explicit parse/validation outcomes instead of a catch-all exception
/// path. The Display text is exactly what goes back to the originating
/// client inside an `ERROR` envelope; rejections are never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Reject {
    /// Payload could not be parsed into an envelope, or carried an
    /// unknown kind
    #[error("Error processing message")]
    InvalidPayload,

    /// SET_NAME with a blank name
    #[error("Invalid name")]
    InvalidName,

    /// Blank message body
    #[error("Invalid message")]
    InvalidMessage,

    /// Envelope parsed but is missing the sender or content field
    #[error("Invalid message format")]
    InvalidFormat,

    /// Chat content received before the connection completed SET_NAME
    #[error("Register a name before sending messages")]
    NameRequired,
}

/// Outbound channel send errors
///
/// Occurs when queueing a frame for a connection's write task fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is full (slow consumer); frame dropped
    #[error("Channel full")]
    ChannelFull,
}
