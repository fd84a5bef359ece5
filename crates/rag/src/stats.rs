use serde::{Deserialize, Serialize};

/// Outcome of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Document name as recorded in the manifest
    pub document: String,

    /// Chunks appended for this document
    pub chunks_added: usize,

    /// Store length after the append
    pub total_chunks: usize,

    /// Committed store generation, `None` when nothing needed saving
    pub generation: Option<u64>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

/// Aggregate over a multi-document ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Documents ingested successfully
    pub documents: usize,

    /// Chunks appended across all documents
    pub chunks: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Per-document failures, `(document, message)`
    pub errors: Vec<(String, String)>,
}

impl IngestStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report(&mut self, report: &IngestReport) {
        self.documents += 1;
        self.chunks += report.chunks_added;
    }

    pub fn add_error(&mut self, document: impl Into<String>, message: impl Into<String>) {
        self.errors.push((document.into(), message.into()));
    }
}

/// Snapshot of the resident store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub dimension: Option<usize>,
    /// Distinct documents with at least one chunk
    pub documents_with_chunks: usize,
    /// Entries in the ingestion manifest
    pub manifest_entries: usize,
    pub embedder: String,
    pub generator: String,
    pub store_prefix: String,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dimension = self
            .dimension
            .map_or_else(|| "unset".to_string(), |d| d.to_string());
        writeln!(f, "Store:      {}", self.store_prefix)?;
        writeln!(f, "Chunks:     {}", self.chunks)?;
        writeln!(f, "Dimension:  {dimension}")?;
        writeln!(
            f,
            "Documents:  {} ({} manifest entries)",
            self.documents_with_chunks, self.manifest_entries
        )?;
        writeln!(f, "Embedder:   {}", self.embedder)?;
        write!(f, "Generator:  {}", self.generator)
    }
}
