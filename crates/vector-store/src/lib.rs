//! # Docchat Vector Store
//!
//! Persistent storage of document chunks and their embeddings, with exact nearest-neighbor
//! search.
//!
//! ## Features
//!
//! - **Exact k-NN** under squared Euclidean distance, ties broken by position
//! - **Positional correspondence** between vectors and chunks: position `i` in the index is
//!   ordinal `i` in the chunk store
//! - **Crash-safe persistence**: generation-named vector files committed by an atomic rename
//!   of the chunk file
//! - **Pluggable embedders**: deterministic stub, or ONNX sentence-transformers behind the
//!   `onnx` feature
//!
//! ## Architecture
//!
//! ```text
//! TextChunk[]
//!     │
//!     ├──> Embedder
//!     │      └─> Vector[D]
//!     │
//!     ├──> VectorIndex (position i) ──┐
//!     ├──> ChunkStore  (ordinal i)  ──┴──> PersistenceManager
//!     │                                      ├─> <prefix>.vectors.<gen>.bin
//!     │                                      └─> <prefix>.chunks.json (commit)
//!     └──> DocumentManifest
//!            └─> <prefix>.documents.txt
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docchat_vector_store::{
//!     ChunkStore, Embedder, PersistenceManager, StoreLayout, StubEmbedder, VectorIndex,
//! };
//! use docchat_text_chunker::TextChunk;
//!
//! #[tokio::main]
//! async fn main() -> docchat_vector_store::Result<()> {
//!     let embedder = StubEmbedder::default();
//!     let spans = vec![TextChunk::new("Refunds take 30 days.", "policy.txt")];
//!     let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
//!
//!     let mut index = VectorIndex::new();
//!     let mut chunks = ChunkStore::new();
//!     index.append(&embedder.embed_batch(&texts).await?)?;
//!     chunks.append(spans);
//!
//!     let manager = PersistenceManager::new(StoreLayout::in_dir("data"));
//!     manager.save(&index, &chunks).await?;
//!
//!     let query = embedder.embed("how long do refunds take").await?;
//!     for hit in index.search(&query, 3)? {
//!         println!("{:.3} {}", hit.distance, chunks.get(hit.position)?.text);
//!     }
//!     Ok(())
//! }
//! ```

mod chunk_store;
mod embeddings;
mod error;
mod layout;
mod lock;
mod manifest;
#[cfg(feature = "onnx")]
mod onnx;
mod persistence;
mod types;
mod vector_file;
mod vector_index;

pub use chunk_store::ChunkStore;
pub use embeddings::{
    cosine_similarity, Embedder, EmbeddingMode, StubEmbedder, DEFAULT_EMBEDDING_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use layout::{StoreLayout, DEFAULT_STORE_NAME};
pub use manifest::DocumentManifest;
#[cfg(feature = "onnx")]
pub use onnx::{OnnxEmbedder, DEFAULT_ONNX_MODEL_ID};
pub use persistence::{PersistenceManager, SaveReport, StagedSave, STORE_FORMAT_VERSION};
pub use types::{Chunk, Neighbor, SearchResult};
pub use vector_index::VectorIndex;

// Re-export chunker types for convenience
pub use docchat_text_chunker::TextChunk;
