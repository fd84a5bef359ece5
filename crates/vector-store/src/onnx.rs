use crate::embeddings::{normalize, Embedder};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, Axis, Ix2, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

pub const DEFAULT_ONNX_MODEL_ID: &str = "all-MiniLM-L6-v2";

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const MAX_TOKENS: usize = 256;
const BATCH_SIZE: usize = 32;

fn onnx_error<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> VectorStoreError {
    move |e| VectorStoreError::EmbeddingError(format!("{what}: {e}"))
}

/// Sentence-transformer embedder: tokenize, run the ONNX graph, mean-pool over the attention
/// mask, L2-normalize. Model files live at `<model_dir>/<model_id>/{model.onnx,tokenizer.json}`.
pub struct OnnxEmbedder {
    model: Arc<SentenceModel>,
    model_id: String,
}

struct SentenceModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
}

/// One tokenized batch, padded to a common length
struct TokenBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path, model_id: &str, dimension: usize) -> Result<Self> {
        let dir = model_dir.join(model_id);
        let model_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        if !model_path.is_file() || !tokenizer_path.is_file() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Model files are missing under {} (need {MODEL_FILE} and {TOKENIZER_FILE}); \
                 set DOCCHAT_MODEL_DIR or switch to DOCCHAT_EMBEDDING_MODE=stub",
                dir.display()
            )));
        }

        let model = SentenceModel {
            tokenizer: load_tokenizer(&tokenizer_path)?,
            session: Mutex::new(open_session(&model_path)?),
            dimension,
        };
        log::info!("Loaded ONNX model '{model_id}' (dim {dimension}) from {}", dir.display());
        Ok(Self {
            model: Arc::new(model),
            model_id: model_id.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.model.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let texts = texts.to_vec();
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            texts
                .chunks(BATCH_SIZE)
                .map(|batch| model.embed_blocking(batch))
                .collect::<Result<Vec<_>>>()
                .map(|batches| batches.into_iter().flatten().collect())
        })
        .await
        .map_err(onnx_error("embedding task aborted"))?
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    if !tokenizers::utils::parallelism::is_parallelism_configured() {
        tokenizers::utils::parallelism::set_parallelism(false);
    }
    let mut tokenizer = Tokenizer::from_file(path).map_err(onnx_error("cannot read tokenizer"))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..PaddingParams::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TOKENS,
            ..TruncationParams::default()
        }))
        .map_err(onnx_error("cannot configure truncation"))?;
    Ok(tokenizer)
}

fn open_session(path: &Path) -> Result<Session> {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get().min(4));
    Session::builder()
        .map_err(onnx_error("cannot create ORT session"))?
        .with_intra_threads(threads)
        .map_err(onnx_error("cannot set ORT threads"))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(onnx_error("cannot register CPU provider"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(onnx_error("cannot set graph optimization"))?
        .commit_from_file(path)
        .map_err(onnx_error("cannot load ONNX model"))
}

impl SentenceModel {
    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(onnx_error("tokenization failed"))?;
        let batch = TokenBatch::from_encodings(&encodings)?;
        let hidden = self.forward(&batch)?;
        pool_output(hidden, batch.attention_mask.view(), self.dimension)
    }

    fn forward(&self, batch: &TokenBatch) -> Result<ArrayD<f32>> {
        let mut named: HashMap<&str, DynTensor> = HashMap::from([
            ("input_ids", tensor(&batch.input_ids)?),
            ("attention_mask", tensor(&batch.attention_mask)?),
            ("token_type_ids", tensor(&batch.token_type_ids)?),
        ]);

        let mut session = self
            .session
            .lock()
            .map_err(|_| VectorStoreError::EmbeddingError("ONNX session poisoned".into()))?;
        let mut feed: HashMap<String, DynTensor> = HashMap::new();
        for input in &session.inputs {
            let value = named.remove(input.name.as_str()).ok_or_else(|| {
                VectorStoreError::EmbeddingError(format!(
                    "model expects unknown input '{}'",
                    input.name
                ))
            })?;
            feed.insert(input.name.clone(), value);
        }

        let outputs = session
            .run(SessionInputs::from(feed))
            .map_err(onnx_error("inference failed"))?;
        if outputs.len() == 0 {
            return Err(VectorStoreError::EmbeddingError(
                "model produced no outputs".to_string(),
            ));
        }
        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .map_err(onnx_error("unreadable model output"))?
            .to_owned();
        Ok(hidden)
    }
}

impl TokenBatch {
    fn from_encodings(encodings: &[Encoding]) -> Result<Self> {
        let width = encodings.first().map_or(0, Encoding::len);
        if encodings.iter().any(|e| e.len() != width) {
            return Err(VectorStoreError::EmbeddingError(
                "tokenizer returned ragged batch".to_string(),
            ));
        }
        let shape = (encodings.len(), width);
        let column = |pick: fn(&Encoding) -> &[u32]| {
            Array2::from_shape_fn(shape, |(row, col)| i64::from(pick(&encodings[row])[col]))
        };
        Ok(Self {
            input_ids: column(Encoding::get_ids),
            attention_mask: column(Encoding::get_attention_mask),
            token_type_ids: column(Encoding::get_type_ids),
        })
    }
}

fn tensor(array: &Array2<i64>) -> Result<DynTensor> {
    Tensor::from_array(array.clone().into_dyn())
        .map(Tensor::upcast)
        .map_err(onnx_error("cannot build input tensor"))
}

/// Turn model output into one normalized vector per input row. Rank-2 output is already
/// pooled; rank-3 output is token states and gets mean-pooled over the attention mask.
fn pool_output(
    output: ArrayD<f32>,
    mask: ArrayView2<'_, i64>,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let pooled: Vec<Vec<f32>> = match output.ndim() {
        2 => output
            .into_dimensionality::<Ix2>()
            .map_err(onnx_error("bad output shape"))?
            .outer_iter()
            .map(|row| row.to_vec())
            .collect(),
        3 => {
            let states = output
                .into_dimensionality::<Ix3>()
                .map_err(onnx_error("bad output shape"))?;
            states
                .outer_iter()
                .zip(mask.outer_iter())
                .map(|(tokens, row_mask)| mean_pool(tokens, row_mask))
                .collect()
        }
        n => {
            return Err(VectorStoreError::EmbeddingError(format!(
                "model output has rank {n}, expected 2 or 3"
            )))
        }
    };

    pooled
        .into_iter()
        .map(|mut vector| {
            if vector.len() != dimension {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            normalize(&mut vector);
            Ok(vector)
        })
        .collect()
}

fn mean_pool(tokens: ArrayView2<'_, f32>, mask: ArrayView1<'_, i64>) -> Vec<f32> {
    let mut sum = vec![0.0f32; tokens.len_of(Axis(1))];
    let mut kept = 0usize;
    for (token, _) in tokens.outer_iter().zip(mask.iter()).filter(|(_, m)| **m != 0) {
        kept += 1;
        sum.iter_mut().zip(token.iter()).for_each(|(acc, v)| *acc += v);
    }
    if kept > 0 {
        let scale = 1.0 / kept as f32;
        sum.iter_mut().for_each(|v| *v *= scale);
    }
    sum
}
