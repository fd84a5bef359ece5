use docchat_vector_store::{
    ChunkStore, Neighbor, Result, SearchResult, TextChunk, VectorIndex, VectorStoreError,
};
use std::ops::Range;

/// The resident (vector index, chunk store) pair. Position `i` in the index is ordinal `i` in
/// the chunk store, and both always hold the same number of entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    index: VectorIndex,
    chunks: ChunkStore,
}

impl StoreState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair a loaded index and chunk store
    pub fn from_parts(index: VectorIndex, chunks: ChunkStore) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(VectorStoreError::CountMismatch {
                chunks: chunks.len(),
                vectors: index.len(),
            });
        }
        Ok(Self { index, chunks })
    }

    /// Append spans with their vectors as one step. The vector side validates everything before
    /// mutating, and the chunk side cannot fail, so on error neither side changed.
    pub fn append(&mut self, spans: Vec<TextChunk>, vectors: &[Vec<f32>]) -> Result<Range<usize>> {
        if spans.len() != vectors.len() {
            return Err(VectorStoreError::CountMismatch {
                chunks: spans.len(),
                vectors: vectors.len(),
            });
        }
        let positions = self.index.append(vectors)?;
        let ordinals = self.chunks.append(spans);
        debug_assert_eq!(positions, ordinals);
        debug_assert_eq!(self.index.len(), self.chunks.len());
        Ok(ordinals)
    }

    /// Top-k neighbors joined with their chunks. Positions without a chunk are skipped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let hits: Vec<Neighbor> = self.index.search(query, k)?;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| match self.chunks.get(hit.position) {
                Ok(chunk) => Some(SearchResult {
                    chunk: chunk.clone(),
                    distance: hit.distance,
                }),
                Err(err) => {
                    log::warn!("Skipping search hit without a chunk: {err}");
                    None
                }
            })
            .collect();
        Ok(results)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    #[must_use]
    pub const fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub const fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }
}
