use crate::error::{RagError, Result};
use crate::stats::IngestReport;
use crate::store_state::StoreState;
use docchat_text_chunker::{Document, TextSplitter};
use docchat_vector_store::{DocumentManifest, Embedder, PersistenceManager, VectorStoreError};
use std::time::Instant;

/// Chunk → embed → append → persist → record, for one document at a time.
///
/// Every collaborator call happens before the resident state is touched, so a failure in the
/// chunker or embedder leaves the state exactly as it was.
pub struct IngestionPipeline<'a> {
    pub splitter: &'a dyn TextSplitter,
    pub embedder: &'a dyn Embedder,
    pub persistence: &'a PersistenceManager,
    pub manifest: &'a DocumentManifest,
}

impl IngestionPipeline<'_> {
    pub async fn run(&self, state: &mut StoreState, document: &Document) -> Result<IngestReport> {
        let start = Instant::now();

        let spans = self
            .splitter
            .split(document)
            .map_err(RagError::from_chunker)?;

        if spans.is_empty() {
            log::info!("'{}' produced no chunks; nothing to index", document.name);
            self.record(&document.name).await;
            return Ok(IngestReport {
                document: document.name.clone(),
                chunks_added: 0,
                total_chunks: state.len(),
                generation: None,
                time_ms: elapsed_ms(start),
            });
        }

        let texts: Vec<String> = spans.iter().map(|span| span.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(RagError::from_embedder)?;
        if vectors.len() != spans.len() {
            return Err(RagError::from_embedder(VectorStoreError::CountMismatch {
                chunks: spans.len(),
                vectors: vectors.len(),
            }));
        }

        let chunks_added = spans.len();
        state.append(spans, &vectors)?;
        log::debug!(
            "Appended {chunks_added} chunks from '{}' (store now {})",
            document.name,
            state.len()
        );

        let report = self
            .persistence
            .save(state.index(), state.chunks())
            .await
            .map_err(|source| RagError::PersistFailure {
                document: document.name.clone(),
                chunks_added,
                source,
            })?;

        self.record(&document.name).await;
        log::info!(
            "Ingested '{}': {chunks_added} chunks (store now {}, generation {})",
            document.name,
            state.len(),
            report.generation
        );
        Ok(IngestReport {
            document: document.name.clone(),
            chunks_added,
            total_chunks: state.len(),
            generation: Some(report.generation),
            time_ms: elapsed_ms(start),
        })
    }

    async fn record(&self, document: &str) {
        if let Err(err) = self.manifest.record(document).await {
            log::warn!(
                "Failed to record '{document}' in {}: {err}",
                self.manifest.path().display()
            );
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
