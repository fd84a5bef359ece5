use docchat_rag::{Document, Generation, IngestReport, RagEngine, RagError};
use std::path::Path;

pub const MSG_NO_CORPUS: &str = "Please upload and process a document first.";
pub const MSG_NO_RELEVANT: &str = "No relevant content found.";
pub const MSG_NO_DOCUMENTS: &str = "No documents ingested yet.";

/// One question/answer exchange in a chat session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// The three operations a user interface may call. Every error is rendered to text here.
pub struct ChatFrontend {
    engine: RagEngine,
}

impl ChatFrontend {
    pub const fn new(engine: RagEngine) -> Self {
        Self { engine }
    }

    pub const fn engine(&self) -> &RagEngine {
        &self.engine
    }

    /// Ingest a file and describe the outcome in one line
    pub async fn ingest(&self, path: &Path) -> String {
        ingest_status(&self.engine.ingest_path(path).await)
    }

    pub async fn ingest_document(&self, document: &Document) -> String {
        ingest_status(&self.engine.ingest_document(document).await)
    }

    /// Answer `question` against the store.
    ///
    /// Returns `(message, history)`. On success the message is empty (the input box is cleared)
    /// and the exchange is appended to `history`. Otherwise the message explains what went
    /// wrong and `history` comes back unchanged.
    pub async fn ask(&self, question: &str, mut history: Vec<Turn>) -> (String, Vec<Turn>) {
        let question = question.trim();
        if question.is_empty() {
            return (String::new(), history);
        }

        let mut result = self.engine.ask(question, None).await;
        if matches!(result, Err(RagError::NoCorpus)) {
            // Another process may have ingested since this one loaded the store
            self.engine.invalidate().await;
            result = self.engine.ask(question, None).await;
        }

        match result {
            Ok(answer) => {
                history.push(Turn {
                    question: question.to_string(),
                    answer: render_generation(&answer.generation),
                });
                (String::new(), history)
            }
            Err(err) => (render_error(&err), history),
        }
    }

    /// Ingested document names, one per line
    pub async fn list_ingested_documents(&self) -> String {
        match self.engine.list_documents().await {
            Ok(names) if names.is_empty() => MSG_NO_DOCUMENTS.to_string(),
            Ok(names) => names.join("\n"),
            Err(err) => render_error(&err),
        }
    }
}

pub fn ingest_status(result: &docchat_rag::Result<IngestReport>) -> String {
    match result {
        Ok(report) => format!(
            "Added {} chunks from '{}'.",
            report.chunks_added, report.document
        ),
        Err(err) => render_error(err),
    }
}

pub fn render_generation(generation: &Generation) -> String {
    match generation {
        Generation::Answered(text) => text.clone(),
        Generation::Failed(message) => format!("Generation error: {message}"),
    }
}

pub fn render_error(err: &RagError) -> String {
    match err {
        RagError::NoCorpus => MSG_NO_CORPUS.to_string(),
        RagError::NoRelevantContent => MSG_NO_RELEVANT.to_string(),
        other => format!("Error: {other}"),
    }
}
