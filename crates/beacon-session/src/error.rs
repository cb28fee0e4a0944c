//! Error types for conversation storage.

/// Error type for conversation storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Conversation was not found.
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// Stored data could not be decoded or written.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error from the SQLite backend.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

/// Result type for conversation storage operations.
pub type Result<T> = std::result::Result<T, Error>;
