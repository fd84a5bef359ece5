//! # docchat Text Chunker
//!
//! Document loading and overlap-aware text splitting for retrieval.
//!
//! ## Pipeline
//!
//! ```text
//! File (.pdf / .txt / .md)
//!     │
//!     ├──> Document::from_path
//!     │      └─> pages of plain text
//!     │
//!     └──> Chunker (recursive character splitter)
//!            ├─> try "\n\n", then "\n", then " ", then single characters
//!            ├─> merge pieces up to chunk_size
//!            └─> carry chunk_overlap characters into the next chunk
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docchat_text_chunker::{Chunker, ChunkerConfig, Document, TextSplitter};
//!
//! let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
//! let doc = Document::from_text("notes.txt", "First paragraph.\n\nSecond paragraph.");
//!
//! let chunks = chunker.split(&doc).unwrap();
//! for chunk in chunks {
//!     println!("{}: {}", chunk.origin_document, chunk.text);
//! }
//! ```

mod chunker;
mod config;
mod document;
mod error;
mod types;

pub use chunker::{Chunker, ChunkingStats, TextSplitter};
pub use config::{ChunkerConfig, DEFAULT_SEPARATORS};
pub use document::{Document, DocumentKind};
pub use error::{ChunkerError, Result};
pub use types::TextChunk;
