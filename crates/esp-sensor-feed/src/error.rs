/*
[INPUT]:  Error sources (JSON decode, display lookup, WebSocket, timestamps, IO)
[OUTPUT]: Structured error type shared by the feed library
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the sensor feed
#[derive(Error, Debug)]
pub enum FeedError {
    /// Frame was not valid JSON or did not have the expected shape
    #[error("Frame decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// A display element the listener writes to does not exist
    #[error("Display element not found: {id}")]
    MissingElement { id: String },

    /// The WebSocket handshake failed
    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },

    /// WebSocket transport error after the connection was established
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Epoch milliseconds cannot be represented as a calendar date
    #[error("Timestamp out of range: {millis}ms")]
    TimestampOutOfRange { millis: i64 },

    /// Socket bind/accept failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether the error only affects the frame being handled.
    ///
    /// Frame-local errors are logged and the listening loop moves on to the
    /// next frame; everything else concerns the connection itself.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            FeedError::Decode(_) | FeedError::TimestampOutOfRange { .. }
        )
    }
}

/// Result type alias for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;
