//! # Docchat RAG
//!
//! Retrieval-augmented question answering over a persistent, growing document store.
//!
//! ## Pipeline
//!
//! ```text
//! Document ──> Chunker ──> Embedder ──> StoreState.append ──> PersistenceManager.save
//!                                                                   └─> manifest
//!
//! Question ──> Embedder ──> StoreState.search(k) ──> prompt ──> Generator ──> Answer
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docchat_rag::{Generation, RagConfig, RagEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = RagEngine::from_config(RagConfig::load(None)?)?;
//!     let report = engine.ingest_path("handbook.pdf".as_ref()).await?;
//!     println!("Added {} chunks from '{}'", report.chunks_added, report.document);
//!
//!     let answer = engine.ask("How many vacation days do I get?", None).await?;
//!     if let Generation::Answered(text) = answer.generation {
//!         println!("{text}");
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod generator;
mod ingest;
mod retrieve;
mod stats;
mod store_state;

pub use config::{
    EmbeddingConfig, GeneratorConfig, GeneratorKind, RagConfig, RetrievalConfig, StoreConfig,
    DEFAULT_CONFIG_FILE, ENV_API_KEY, ENV_EMBEDDING_MODE, ENV_GENERATOR, ENV_GENERATOR_MODEL,
    ENV_GENERATOR_URL, ENV_MODEL_DIR, ENV_STORE_DIR,
};
pub use engine::{build_embedder, RagEngine};
pub use error::{Collaborator, RagError, Result};
pub use generator::{build_generator, ExtractiveGenerator, Generator, OpenAiCompatibleGenerator};
pub use ingest::IngestionPipeline;
pub use retrieve::{build_prompt, Answer, Generation, RetrievalPipeline, DEFAULT_TOP_K};
pub use stats::{IngestReport, IngestStats, StoreStats};
pub use store_state::StoreState;

pub use docchat_text_chunker::Document;
pub use docchat_vector_store::EmbeddingMode;
