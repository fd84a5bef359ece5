use crate::error::{ChunkerError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// How the document text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Extracted page by page from a PDF
    Pdf,
    /// Read as UTF-8 text
    Text,
}

/// A loaded document: a display name plus its text, split into pages when the source has them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub kind: DocumentKind,
    pub pages: Vec<String>,
}

impl Document {
    /// Build a single-page text document from memory
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DocumentKind::Text,
            pages: vec![normalize_text(&text.into())],
        }
    }

    /// Build a paged document from memory
    pub fn from_pages(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: DocumentKind::Pdf,
            pages: pages.iter().map(|page| normalize_text(page)).collect(),
        }
    }

    /// Load a document from disk. `.pdf` files are extracted per page, everything else is read
    /// as UTF-8 text. The document name is the file's base name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(ToString::to_string)
            .unwrap_or_else(|| path.display().to_string());

        if Self::is_pdf(path) {
            log::debug!("Extracting PDF text from {}", path.display());
            // pdf-extract panics on some malformed font tables instead of returning an error.
            let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
                .map_err(|_| {
                    ChunkerError::extraction(path.display().to_string(), "PDF parser panicked")
                })?;
            let pages = extracted.map_err(|err| {
                ChunkerError::extraction(path.display().to_string(), err.to_string())
            })?;
            return Ok(Self::from_pages(name, pages));
        }

        let bytes = std::fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|err| {
            ChunkerError::extraction(path.display().to_string(), format!("not UTF-8 text: {err}"))
        })?;
        Ok(Self::from_text(name, text))
    }

    /// Whether a path has a file extension this loader understands
    #[must_use]
    pub fn is_supported(path: &Path) -> bool {
        matches!(
            extension_lowercase(path).as_deref(),
            Some("pdf" | "txt" | "md" | "markdown" | "text")
        )
    }

    fn is_pdf(path: &Path) -> bool {
        extension_lowercase(path).as_deref() == Some("pdf")
    }

    /// Whether the document has no non-whitespace text
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|page| page.trim().is_empty())
    }

    /// Total length in characters across pages
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.pages.iter().map(|page| page.chars().count()).sum()
    }
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn horizontal_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").expect("static regex"))
}

/// Unify line endings and collapse runs of horizontal whitespace left by extraction
fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    horizontal_space().replace_all(&unified, " ").into_owned()
}
