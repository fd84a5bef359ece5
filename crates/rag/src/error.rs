use docchat_text_chunker::ChunkerError;
use docchat_vector_store::VectorStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// External component that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    DocumentLoader,
    Chunker,
    Embedder,
    Generator,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DocumentLoader => "document loader",
            Self::Chunker => "chunker",
            Self::Embedder => "embedder",
            Self::Generator => "generator",
        })
    }
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Vector store error: {0}")]
    Store(#[from] VectorStoreError),

    #[error("{collaborator} failed: {message}")]
    CollaboratorFailure {
        collaborator: Collaborator,
        message: String,
    },

    /// Ingestion appended to the resident state but the save failed. The next successful save
    /// persists it.
    #[error("Added {chunks_added} chunks from '{document}' but saving the store failed: {source}")]
    PersistFailure {
        document: String,
        chunks_added: usize,
        #[source]
        source: VectorStoreError,
    },

    #[error("No documents have been ingested yet")]
    NoCorpus,

    #[error("No relevant content found")]
    NoRelevantContent,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RagError {
    pub fn collaborator(collaborator: Collaborator, message: impl std::fmt::Display) -> Self {
        Self::CollaboratorFailure {
            collaborator,
            message: message.to_string(),
        }
    }

    pub(crate) fn from_loader(err: ChunkerError) -> Self {
        Self::collaborator(Collaborator::DocumentLoader, err)
    }

    pub(crate) fn from_chunker(err: ChunkerError) -> Self {
        Self::collaborator(Collaborator::Chunker, err)
    }

    pub(crate) fn from_embedder(err: VectorStoreError) -> Self {
        Self::collaborator(Collaborator::Embedder, err)
    }
}
