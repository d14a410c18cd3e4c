//! Error types for medrag

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the medrag system
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract text from {path}: {reason}")]
    PdfExtraction { path: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Chat model error: {0}")]
    ChatModel(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by bad caller input rather than a failure
    /// inside the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
