use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Chunk ordinal {ordinal} is out of range (store holds {len} chunks)")]
    OutOfRange { ordinal: usize, len: usize },

    #[error("Cannot append {vectors} vectors alongside {chunks} chunks")]
    CountMismatch { chunks: usize, vectors: usize },

    #[error("Corrupt store at {path}: {reason}")]
    CorruptStore { path: String, reason: String },

    #[error("No store found at {0}")]
    NotFound(String),

    #[error("Search against an empty index")]
    EmptyIndex,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl VectorStoreError {
    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}
