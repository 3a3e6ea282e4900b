//! Error types shared by the Livecast core boundaries.

use thiserror::Error;

/// Result type alias for Livecast core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur at the recognizer and translation boundaries
#[derive(Debug, Error)]
pub enum Error {
    /// Recognizer connection or stream failure
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    /// Translation call failure
    #[error("Translation error: {0}")]
    Translation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
