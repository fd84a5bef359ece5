use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Default embedding dimension, shared by the stub and `all-MiniLM-L6-v2`
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Which embedder backs a store
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Deterministic hashed bag-of-words vectors, no model files
    #[default]
    Stub,
    /// Sentence-transformer through ONNX Runtime (`onnx` feature)
    Onnx,
}

impl EmbeddingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Onnx => "onnx",
        }
    }
}

impl Display for EmbeddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "onnx" => Ok(Self::Onnx),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported embedding mode '{other}' (expected 'stub' or 'onnx')"
            ))),
        }
    }
}

/// Text to fixed-dimension vectors. Every vector an embedder returns has length
/// [`Embedder::dimension`], and batches come back in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Identifier recorded in logs and stats
    fn model_id(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

/// Offline embedder: lowercased words are hashed into signed buckets and the result is
/// L2-normalized, so texts sharing vocabulary land close together. Text without any word
/// falls back to a unit vector seeded from its bytes.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    dimension: usize,
    #[cfg(test)]
    batch_calls: Arc<AtomicUsize>,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::EmbeddingError(
                "stub embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            #[cfg(test)]
            batch_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    #[cfg(test)]
    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let mut words = 0usize;
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            let mut state = fnv1a_64(word.as_bytes());
            let bits = splitmix64(&mut state);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (bits % self.dimension as u64) as usize;
            let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
            words += 1;
        }

        if words == 0 || vec.iter().all(|v| *v == 0.0) {
            return seeded_unit_vector(text, self.dimension);
        }
        normalize(&mut vec);
        vec
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            #[cfg(test)]
            batch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        "stub"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[cfg(test)]
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Cosine similarity, 0.0 for mismatched lengths or zero vectors
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn seeded_unit_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn stub_vectors_are_unit_length_and_deterministic() {
        let embedder = StubEmbedder::new(64).unwrap();
        let texts = vec![
            "Refunds are issued within 30 days.".to_string(),
            "   ".to_string(),
            String::new(),
        ];
        let first = embedder.embed_batch(&texts).await.unwrap();
        let second = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        for vector in &first {
            assert_eq!(vector.len(), 64);
            assert!((norm(vector) - 1.0).abs() < 1e-5);
        }
        assert_eq!(embedder.batch_calls(), 2);
    }

    #[tokio::test]
    async fn shared_vocabulary_is_closer() {
        let embedder = StubEmbedder::default();
        let query = embedder.embed("What is the refund policy?").await.unwrap();
        let related = embedder
            .embed("Our refund policy allows returns within 30 days.")
            .await
            .unwrap();
        let unrelated = embedder
            .embed("Parking spaces open at dawn.")
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn embed_is_case_insensitive() {
        let embedder = StubEmbedder::default();
        let lower = embedder.embed("vector store").await.unwrap();
        let upper = embedder.embed("VECTOR Store").await.unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(StubEmbedder::new(0).is_err());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("STUB".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Stub);
        assert_eq!(" onnx ".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Onnx);
        assert!("fast".parse::<EmbeddingMode>().is_err());
        assert_eq!(EmbeddingMode::Onnx.to_string(), "onnx");
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![1.0, 0.0];
        let d = vec![0.0, 1.0];
        assert!(cosine_similarity(&c, &d).abs() < 1e-6);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }
}
