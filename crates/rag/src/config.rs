use crate::error::{RagError, Result};
use docchat_text_chunker::ChunkerConfig;
use docchat_vector_store::{EmbeddingMode, StoreLayout, DEFAULT_EMBEDDING_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "docchat.toml";

pub const ENV_STORE_DIR: &str = "DOCCHAT_STORE_DIR";
pub const ENV_EMBEDDING_MODE: &str = "DOCCHAT_EMBEDDING_MODE";
pub const ENV_MODEL_DIR: &str = "DOCCHAT_MODEL_DIR";
pub const ENV_GENERATOR: &str = "DOCCHAT_GENERATOR";
pub const ENV_GENERATOR_URL: &str = "DOCCHAT_GENERATOR_URL";
pub const ENV_GENERATOR_MODEL: &str = "DOCCHAT_GENERATOR_MODEL";
pub const ENV_API_KEY: &str = "DOCCHAT_API_KEY";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_store_name")]
    pub name: String,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_store_name() -> String {
    docchat_vector_store::DEFAULT_STORE_NAME.into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            name: default_store_name(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(self.dir.join(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    crate::retrieve::DEFAULT_TOP_K
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub mode: EmbeddingMode,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_model_id() -> String {
    "all-MiniLM-L6-v2".into()
}
fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::default(),
            model_dir: default_model_dir(),
            model_id: default_model_id(),
            dimension: default_dimension(),
        }
    }
}

/// Which generator answers questions
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorKind {
    /// Offline: quote the context sentences closest to the question
    #[default]
    Extractive,
    /// Any server speaking the OpenAI chat completions API
    OpenaiCompatible,
}

impl std::str::FromStr for GeneratorKind {
    type Err = RagError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "extractive" => Ok(Self::Extractive),
            "openai" | "openai-compatible" | "openai_compatible" => Ok(Self::OpenaiCompatible),
            other => Err(RagError::InvalidConfig(format!(
                "unknown generator '{other}' (expected 'extractive' or 'openai-compatible')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub kind: GeneratorKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_generator_model() -> String {
    "llama3.2".into()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::default(),
            base_url: default_base_url(),
            model: default_generator_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RagConfig {
    /// Defaults, then `path` (or `./docchat.toml` when present), then `DOCCHAT_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            RagError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `DOCCHAT_*` overrides read through `lookup`
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_STORE_DIR) {
            self.store.dir = PathBuf::from(dir);
        }
        if let Some(mode) = get(ENV_EMBEDDING_MODE) {
            self.embedding.mode = mode
                .parse()
                .map_err(|e: docchat_vector_store::VectorStoreError| {
                    RagError::InvalidConfig(e.to_string())
                })?;
        }
        if let Some(dir) = get(ENV_MODEL_DIR) {
            self.embedding.model_dir = PathBuf::from(dir);
        }
        if let Some(kind) = get(ENV_GENERATOR) {
            self.generator.kind = kind.parse()?;
        }
        if let Some(url) = get(ENV_GENERATOR_URL) {
            self.generator.base_url = url;
        }
        if let Some(model) = get(ENV_GENERATOR_MODEL) {
            self.generator.model = model;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.generator.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking
            .validate()
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        if self.retrieval.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "retrieval.top_k must be > 0".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(RagError::InvalidConfig(
                "embedding.dimension must be > 0".to_string(),
            ));
        }
        if self.store.name.trim().is_empty() {
            return Err(RagError::InvalidConfig(
                "store.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
