use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::store_state::StoreState;
use docchat_vector_store::{Embedder, SearchResult};

pub const DEFAULT_TOP_K: usize = 3;

/// What the generator made of the prompt. A failed generation is still an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Answered(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub question: String,
    pub generation: Generation,
    /// Retrieved chunks, nearest first
    pub sources: Vec<SearchResult>,
}

/// The prompt handed to the generator: retrieved chunk texts joined by newlines, then the
/// question
#[must_use]
pub fn build_prompt(contexts: &[&str], question: &str) -> String {
    let context = contexts.join("\n");
    format!("Answer the question based on the context.\n\nContext: {context}\n\nQuestion: {question}")
}

/// Embed → search → map → prompt → generate
pub struct RetrievalPipeline<'a> {
    pub embedder: &'a dyn Embedder,
    pub generator: &'a dyn Generator,
}

impl RetrievalPipeline<'_> {
    pub async fn run(&self, state: &StoreState, question: &str, k: usize) -> Result<Answer> {
        let sources = self.retrieve(state, question, k).await?;
        Ok(self.answer(question, sources).await)
    }

    /// The part that reads the store: embed the question and take the `k` nearest chunks
    pub async fn retrieve(
        &self,
        state: &StoreState,
        question: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if state.is_empty() {
            return Err(RagError::NoCorpus);
        }

        let query = self
            .embedder
            .embed(question)
            .await
            .map_err(RagError::from_embedder)?;
        let sources = state.search(&query, k)?;
        if sources.is_empty() {
            return Err(RagError::NoRelevantContent);
        }
        Ok(sources)
    }

    /// Prompt the generator with already retrieved chunks. Needs no store access.
    pub async fn answer(&self, question: &str, sources: Vec<SearchResult>) -> Answer {
        let contexts: Vec<&str> = sources.iter().map(|r| r.chunk.text.as_str()).collect();
        let prompt = build_prompt(&contexts, question);
        log::debug!(
            "Retrieved {} chunks (nearest distance {:.4}); prompt is {} chars",
            sources.len(),
            sources.first().map_or(0.0, |r| r.distance),
            prompt.chars().count()
        );

        let generation = match self.generator.generate(&prompt).await {
            Ok(text) => Generation::Answered(text.trim().to_string()),
            Err(err) => {
                log::warn!("Generator '{}' failed: {err:#}", self.generator.name());
                Generation::Failed(format!("{err:#}"))
            }
        };

        Answer {
            question: question.to_string(),
            generation,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_vector_store::{StubEmbedder, TextChunk, VectorStoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_prompt.lock() {
                *last = Some(prompt.to_string());
            }
            if self.fail {
                anyhow::bail!("model overloaded");
            }
            Ok("  forty-two \n".to_string())
        }
    }

    async fn state_from(embedder: &StubEmbedder, texts: &[&str]) -> StoreState {
        let owned: Vec<String> = texts.iter().map(ToString::to_string).collect();
        let vectors = embedder.embed_batch(&owned).await.unwrap();
        let mut state = StoreState::new();
        state
            .append(
                texts.iter().map(|t| TextChunk::new(*t, "doc.txt")).collect(),
                &vectors,
            )
            .unwrap();
        state
    }

    #[test]
    fn prompt_matches_template() {
        assert_eq!(
            build_prompt(&["alpha", "beta"], "why?"),
            "Answer the question based on the context.\n\nContext: alpha\nbeta\n\nQuestion: why?"
        );
    }

    #[tokio::test]
    async fn empty_corpus_never_calls_generator() {
        let embedder = StubEmbedder::default();
        let generator = RecordingGenerator::default();
        let pipeline = RetrievalPipeline {
            embedder: &embedder,
            generator: &generator,
        };

        let err = pipeline
            .run(&StoreState::new(), "anything?", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NoCorpus));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nearest_chunks_reach_the_prompt_in_distance_order() {
        let embedder = StubEmbedder::default();
        let state = state_from(
            &embedder,
            &[
                "Parking opens at dawn.",
                "The refund policy allows returns within 30 days.",
                "Lunch is served at noon.",
            ],
        )
        .await;
        let generator = RecordingGenerator::default();
        let pipeline = RetrievalPipeline {
            embedder: &embedder,
            generator: &generator,
        };

        let answer = pipeline
            .run(&state, "What is the refund policy?", 1)
            .await
            .unwrap();
        assert_eq!(answer.generation, Generation::Answered("forty-two".into()));
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].chunk.ordinal, 1);

        let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(
            prompt,
            build_prompt(
                &["The refund policy allows returns within 30 days."],
                "What is the refund policy?"
            )
        );
    }

    #[tokio::test]
    async fn generator_failure_becomes_answer_text() {
        let embedder = StubEmbedder::default();
        let state = state_from(&embedder, &["Only chunk."]).await;
        let generator = RecordingGenerator {
            fail: true,
            ..RecordingGenerator::default()
        };
        let pipeline = RetrievalPipeline {
            embedder: &embedder,
            generator: &generator,
        };

        let answer = pipeline.run(&state, "question", 3).await.unwrap();
        assert_eq!(
            answer.generation,
            Generation::Failed("model overloaded".into())
        );
    }

    #[tokio::test]
    async fn k_zero_finds_nothing_relevant() {
        let embedder = StubEmbedder::default();
        let state = state_from(&embedder, &["Only chunk."]).await;
        let generator = RecordingGenerator::default();
        let pipeline = RetrievalPipeline {
            embedder: &embedder,
            generator: &generator,
        };

        let err = pipeline.run(&state, "question", 0).await.unwrap_err();
        assert!(matches!(err, RagError::NoRelevantContent));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_surfaced() {
        let state = state_from(&StubEmbedder::new(8).unwrap(), &["Only chunk."]).await;
        let embedder = StubEmbedder::new(16).unwrap();
        let generator = RecordingGenerator::default();
        let pipeline = RetrievalPipeline {
            embedder: &embedder,
            generator: &generator,
        };

        let err = pipeline.run(&state, "question", 3).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::Store(VectorStoreError::DimensionMismatch {
                expected: 8,
                actual: 16
            })
        ));
    }
}
