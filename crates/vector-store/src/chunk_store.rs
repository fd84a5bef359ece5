use crate::error::{Result, VectorStoreError};
use crate::types::Chunk;
use docchat_text_chunker::TextChunk;
use std::ops::Range;

/// Append-only sequence of chunks. A chunk's ordinal is its index in the sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records, which must carry ordinals `0..n` in order.
    pub(crate) fn from_records(chunks: Vec<Chunk>) -> std::result::Result<Self, String> {
        if let Some((idx, chunk)) = chunks
            .iter()
            .enumerate()
            .find(|(idx, chunk)| chunk.ordinal != *idx)
        {
            return Err(format!(
                "chunk record {idx} carries ordinal {}",
                chunk.ordinal
            ));
        }
        Ok(Self { chunks })
    }

    /// Append spans in order, assigning sequential ordinals. Returns the assigned range.
    pub fn append(&mut self, spans: Vec<TextChunk>) -> Range<usize> {
        let start = self.chunks.len();
        self.chunks
            .extend(spans.into_iter().enumerate().map(|(offset, span)| Chunk {
                ordinal: start + offset,
                text: span.text,
                origin_document: span.origin_document,
                page: span.page,
            }));
        start..self.chunks.len()
    }

    pub fn get(&self, ordinal: usize) -> Result<&Chunk> {
        self.chunks.get(ordinal).ok_or(VectorStoreError::OutOfRange {
            ordinal,
            len: self.chunks.len(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Distinct origin documents in first-seen order
    #[must_use]
    pub fn documents(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for chunk in &self.chunks {
            if !out.contains(&chunk.origin_document.as_str()) {
                out.push(&chunk.origin_document);
            }
        }
        out
    }
}
