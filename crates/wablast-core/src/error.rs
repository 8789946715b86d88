use thiserror::Error;

/// Top-level error type for wablast.
#[derive(Debug, Error)]
pub enum BlastError {
    /// Error reported by the WhatsApp client (bad recipient, transport, timeout).
    #[error("client error: {0}")]
    Client(String),

    /// The WhatsApp session is not connected yet.
    #[error("whatsapp session not ready")]
    SessionNotReady,

    /// Storage (SQLite, media, settings file) error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Request rejected before reaching the dispatcher.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
