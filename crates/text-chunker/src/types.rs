use serde::{Deserialize, Serialize};

/// A span of document text produced by the splitter, before it is assigned an ordinal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text
    pub text: String,

    /// Name of the document this span came from
    pub origin_document: String,

    /// 1-indexed page for paged sources (PDF)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl TextChunk {
    /// Create a new chunk
    pub fn new(text: impl Into<String>, origin_document: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin_document: origin_document.into(),
            page: None,
        }
    }

    /// Builder: set page
    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
