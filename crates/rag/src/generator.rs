use crate::config::{GeneratorConfig, GeneratorKind};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;

/// Produces an answer from a fully assembled prompt. Failures are opaque.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn build_generator(config: &GeneratorConfig) -> anyhow::Result<Arc<dyn Generator>> {
    Ok(match config.kind {
        GeneratorKind::Extractive => Arc::new(ExtractiveGenerator::default()),
        GeneratorKind::OpenaiCompatible => Arc::new(OpenAiCompatibleGenerator::new(config)?),
    })
}

/// Chat completions client for OpenAI-compatible servers (OpenAI, Ollama, llama.cpp, vLLM)
pub struct OpenAiCompatibleGenerator {
    base_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self
            .apply_auth(req)
            .send()
            .await
            .with_context(|| format!("connection to {url} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {status}: {text}"));
        }

        let json: Value = resp.json().await.context("invalid response body")?;
        let content = json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| anyhow!("no choices in response"))?;
        Ok(content.trim().to_string())
    }
}

/// Offline generator: answers with the context sentences that share the most words with the
/// question, in their original order.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_sentences: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_sentences: 3 }
    }
}

impl ExtractiveGenerator {
    #[must_use]
    pub const fn new(max_sentences: usize) -> Self {
        Self { max_sentences }
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let (context, question) = split_prompt(prompt)
            .ok_or_else(|| anyhow!("prompt has no Context/Question sections"))?;
        let question_words = word_set(question);

        let sentences: Vec<&str> = context
            .lines()
            .flat_map(|line| line.unicode_sentences())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(idx, sentence)| (idx, word_set(sentence).intersection(&question_words).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(idx, _)| *idx);

        if scored.is_empty() {
            return Ok(sentences
                .first()
                .map_or_else(|| "I don't know.".to_string(), ToString::to_string));
        }
        Ok(scored
            .iter()
            .map(|(idx, _)| sentences[*idx])
            .collect::<Vec<_>>()
            .join(" "))
    }
}

fn split_prompt(prompt: &str) -> Option<(&str, &str)> {
    let (_, rest) = prompt.split_once("Context: ")?;
    let (context, question) = rest.rsplit_once("\n\nQuestion: ")?;
    Some((context, question))
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

fn word_set(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}
