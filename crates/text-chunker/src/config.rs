use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Separators tried in order, coarsest first. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for text splitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters (soft limit for unsplittable runs)
    pub chunk_size: usize,

    /// Characters of trailing context repeated at the start of the next chunk
    pub chunk_overlap: usize,

    /// Separators tried in order
    pub separators: Vec<String>,

    /// Trim leading and trailing whitespace from every chunk
    pub strip_whitespace: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
            strip_whitespace: true,
        }
    }
}

impl ChunkerConfig {
    /// Config with explicit size and overlap, default separators
    #[must_use]
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::invalid_config("chunk_size must be > 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkerError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.separators.is_empty() {
            return Err(ChunkerError::invalid_config(
                "at least one separator is required",
            ));
        }

        Ok(())
    }
}
