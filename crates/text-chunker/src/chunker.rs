use crate::config::ChunkerConfig;
use crate::document::{Document, DocumentKind};
use crate::error::Result;
use crate::types::TextChunk;
use std::collections::VecDeque;

/// Anything that turns a document into an ordered sequence of text spans.
///
/// Implementations must be deterministic: the same document always yields the same spans.
pub trait TextSplitter: Send + Sync {
    fn split(&self, document: &Document) -> Result<Vec<TextChunk>>;
}

/// Recursive character splitter
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split a single block of text into chunk strings
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = self.split_recursive(text, &self.config.separators);
        chunks.retain(|chunk| !chunk.is_empty());
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut finer: &[String] = &[];
        for (idx, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[idx + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                out.extend(self.merge_splits(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                if let Some(chunk) = self.finish_chunk(piece) {
                    out.push(chunk);
                }
            } else {
                out.extend(self.split_recursive(&piece, finer));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge_splits(&fitting));
        }
        out
    }

    /// Greedily pack pieces into chunks of at most `chunk_size` characters, then keep up to
    /// `chunk_overlap` characters of trailing pieces as the start of the next chunk.
    fn merge_splits(&self, pieces: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > size {
                if total > size {
                    log::warn!("Created a chunk of size {total}, which is longer than the specified {size}");
                }
                if !window.is_empty() {
                    if let Some(doc) = self.join_window(&window) {
                        docs.push(doc);
                    }
                    while total > overlap || (total + len > size && total > 0) {
                        let Some((_, front_len)) = window.pop_front() else {
                            break;
                        };
                        total -= front_len;
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }

        if let Some(doc) = self.join_window(&window) {
            docs.push(doc);
        }
        docs
    }

    fn join_window(&self, window: &VecDeque<(&str, usize)>) -> Option<String> {
        let joined: String = window.iter().map(|(piece, _)| *piece).collect();
        self.finish_chunk(joined)
    }

    fn finish_chunk(&self, chunk: String) -> Option<String> {
        let chunk = if self.config.strip_whitespace {
            chunk.trim().to_string()
        } else {
            chunk
        };
        (!chunk.is_empty()).then_some(chunk)
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(chunks: &[TextChunk]) -> ChunkingStats {
        let lengths: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
        let total_chars: usize = lengths.iter().sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_chars,
            avg_chars_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_chars / chunks.len()
            },
            min_chars: lengths.iter().copied().min().unwrap_or(0),
            max_chars: lengths.iter().copied().max().unwrap_or(0),
        }
    }
}

impl TextSplitter for Chunker {
    fn split(&self, document: &Document) -> Result<Vec<TextChunk>> {
        let mut chunks = Vec::new();
        for (idx, page) in document.pages.iter().enumerate() {
            for text in self.split_text(page) {
                let chunk = TextChunk::new(text, document.name.clone());
                let chunk = match document.kind {
                    DocumentKind::Pdf => chunk.with_page(u32::try_from(idx + 1).unwrap_or(u32::MAX)),
                    DocumentKind::Text => chunk,
                };
                chunks.push(chunk);
            }
        }
        log::debug!("Split '{}': {}", document.name, Self::get_stats(&chunks));
        Ok(chunks)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub avg_chars_per_chunk: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Chars: {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_chars,
            self.avg_chars_per_chunk,
            self.min_chars,
            self.max_chars
        )
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split on `separator`, re-attaching it to the start of every piece after the first.
/// The empty separator splits into single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        let mut parts = text.split(separator);
        let mut out = Vec::new();
        if let Some(first) = parts.next() {
            out.push(first.to_string());
        }
        out.extend(parts.map(|part| format!("{separator}{part}")));
        out
    };
    pieces.retain(|piece| !piece.is_empty());
    pieces
}
