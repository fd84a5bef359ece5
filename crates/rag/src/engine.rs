use crate::config::{EmbeddingConfig, RagConfig};
use crate::error::{Collaborator, RagError, Result};
use crate::generator::{build_generator, Generator};
use crate::ingest::IngestionPipeline;
use crate::retrieve::{Answer, RetrievalPipeline};
use crate::stats::{IngestReport, StoreStats};
use crate::store_state::StoreState;
use docchat_text_chunker::{Chunker, Document, TextSplitter};
use docchat_vector_store::{
    DocumentManifest, Embedder, EmbeddingMode, PersistenceManager, StubEmbedder,
    VectorStoreError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The retrieval engine: owns the resident store state and the collaborators that feed it.
///
/// State is loaded lazily on first use and then treated as the source of truth. One async
/// mutex serializes loads, ingestions and the retrieval half of queries; answer generation
/// runs after the lock is released.
pub struct RagEngine {
    config: RagConfig,
    splitter: Arc<dyn TextSplitter>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    persistence: PersistenceManager,
    manifest: DocumentManifest,
    state: Mutex<Option<StoreState>>,
}

impl RagEngine {
    /// Build the engine with the collaborators named in `config`
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let splitter: Arc<dyn TextSplitter> = Arc::new(
            Chunker::new(config.chunking.clone())
                .map_err(|e| RagError::InvalidConfig(e.to_string()))?,
        );
        let embedder = build_embedder(&config.embedding)?;
        let generator = build_generator(&config.generator)
            .map_err(|e| RagError::InvalidConfig(format!("{e:#}")))?;
        Ok(Self::with_components(config, splitter, embedder, generator))
    }

    /// Build the engine around explicit collaborators
    pub fn with_components(
        config: RagConfig,
        splitter: Arc<dyn TextSplitter>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let layout = config.store.layout();
        log::debug!(
            "Engine store at {}, embedder '{}' (dim {}), generator '{}'",
            layout.prefix().display(),
            embedder.model_id(),
            embedder.dimension(),
            generator.name()
        );
        Self {
            manifest: DocumentManifest::for_layout(&layout),
            persistence: PersistenceManager::new(layout),
            config,
            splitter,
            embedder,
            generator,
            state: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load a file and ingest it
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        let owned: PathBuf = path.to_path_buf();
        let document = tokio::task::spawn_blocking(move || Document::from_path(&owned))
            .await
            .map_err(|e| RagError::collaborator(Collaborator::DocumentLoader, e))?
            .map_err(RagError::from_loader)?;
        self.ingest_document(&document).await
    }

    /// Ingest an already loaded document
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestReport> {
        let mut guard = self.state.lock().await;
        let state = self.resident(&mut guard).await?;
        IngestionPipeline {
            splitter: self.splitter.as_ref(),
            embedder: self.embedder.as_ref(),
            persistence: &self.persistence,
            manifest: &self.manifest,
        }
        .run(state, document)
        .await
    }

    /// Answer a question from the `k` nearest chunks (configured top-k when `None`)
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let pipeline = RetrievalPipeline {
            embedder: self.embedder.as_ref(),
            generator: self.generator.as_ref(),
        };
        let sources = {
            let mut guard = self.state.lock().await;
            let state = self.resident(&mut guard).await?;
            pipeline
                .retrieve(state, question, k.unwrap_or(self.config.retrieval.top_k))
                .await?
        };
        Ok(pipeline.answer(question, sources).await)
    }

    /// Ingested document names in order
    pub async fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self.manifest.list().await?)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let manifest_entries = self.manifest.list().await?.len();
        let mut guard = self.state.lock().await;
        let state = self.resident(&mut guard).await?;
        Ok(StoreStats {
            chunks: state.len(),
            dimension: state.dimension(),
            documents_with_chunks: state.chunks().documents().len(),
            manifest_entries,
            embedder: self.embedder.model_id().to_string(),
            generator: self.generator.name().to_string(),
            store_prefix: self.persistence.layout().prefix().display().to_string(),
        })
    }

    /// Drop the resident state; the next operation re-reads it from disk
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
        log::debug!("Resident store state invalidated");
    }

    async fn resident<'g>(&self, slot: &'g mut Option<StoreState>) -> Result<&'g mut StoreState> {
        if slot.is_none() {
            let state = match self.persistence.load().await {
                Ok((index, chunks)) => StoreState::from_parts(index, chunks)?,
                Err(VectorStoreError::NotFound(prefix)) => {
                    log::info!("No store at {prefix}; starting empty");
                    StoreState::new()
                }
                Err(err) => return Err(err.into()),
            };
            *slot = Some(state);
        }
        slot.as_mut()
            .ok_or_else(|| RagError::Store(VectorStoreError::Other("store state unavailable".into())))
    }
}

/// Embedder selected by the embedding config
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.mode {
        EmbeddingMode::Stub => Ok(Arc::new(
            StubEmbedder::new(config.dimension).map_err(RagError::from_embedder)?,
        )),
        EmbeddingMode::Onnx => build_onnx_embedder(config),
    }
}

#[cfg(feature = "onnx")]
fn build_onnx_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = docchat_vector_store::OnnxEmbedder::load(
        &config.model_dir,
        &config.model_id,
        config.dimension,
    )
    .map_err(RagError::from_embedder)?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn build_onnx_embedder(_config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Err(RagError::InvalidConfig(
        "embedding mode 'onnx' requires building with the `onnx` feature".to_string(),
    ))
}
