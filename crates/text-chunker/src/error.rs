use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while loading or splitting documents
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file could not be decoded into text
    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an extraction error for a file
    pub fn extraction(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: msg.into(),
        }
    }
}
