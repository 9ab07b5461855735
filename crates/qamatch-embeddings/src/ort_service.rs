//! ONNX Runtime embedding service (feature-gated behind `ort`).
//!
//! Downloads the configured sentence-transformer export via `hf-hub`,
//! tokenizes with `tokenizers`, runs inference via `ort`, then mean-pools the
//! token embeddings over the attention mask.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::errors::{EmbeddingError, Result};
use crate::normalize::mean_pool;
use crate::service::EmbeddingService;

struct InferenceState {
    session: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
}

/// ONNX-based embedding service.
///
/// Constructed fully loaded by [`OnnxEmbeddingService::load`]. `Session::run`
/// needs `&mut`, so inference is serialized behind a mutex on a blocking
/// thread.
pub struct OnnxEmbeddingService {
    config: EmbeddingConfig,
    model_path: PathBuf,
    state: Arc<Mutex<InferenceState>>,
}

impl OnnxEmbeddingService {
    /// Download (if needed) and load the model and tokenizer.
    pub async fn load(config: EmbeddingConfig) -> Result<Self> {
        let (model_path, state) = tokio::task::spawn_blocking({
            let config = config.clone();
            move || -> Result<(PathBuf, InferenceState)> {
                let (model_path, tokenizer_path) = download_model(&config)?;
                info!(model = %model_path.display(), "loading ONNX model");
                let state = build_state(&config, &model_path, &tokenizer_path)?;
                Ok((model_path, state))
            }
        })
        .await
        .map_err(|e| EmbeddingError::Internal(format!("join error: {e}")))??;

        info!(model = %config.model, dims = config.dimensions, "ONNX embedding service ready");
        Ok(Self {
            config,
            model_path,
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Local path of the loaded model file.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Download model files via `hf-hub`, returning (`model_path`, `tokenizer_path`).
fn download_model(config: &EmbeddingConfig) -> Result<(PathBuf, PathBuf)> {
    let cache_dir = config.resolved_cache_dir();
    debug!(cache_dir, model = %config.model, "fetching model via hf-hub");

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(PathBuf::from(&cache_dir))
        .build()
        .map_err(|e| EmbeddingError::ModelInit(format!("hf-hub api: {e}")))?;

    let repo = api.model(config.model.clone());

    let model_path = repo.get(&config.model_file).map_err(|e| {
        EmbeddingError::ModelInit(format!("model download ({}): {e}", config.model_file))
    })?;
    let tokenizer_path = repo
        .get("tokenizer.json")
        .map_err(|e| EmbeddingError::ModelInit(format!("tokenizer download: {e}")))?;

    info!(model = %model_path.display(), tokenizer = %tokenizer_path.display(), "model files ready");
    Ok((model_path, tokenizer_path))
}

fn build_state(
    config: &EmbeddingConfig,
    model_path: &Path,
    tokenizer_path: &Path,
) -> Result<InferenceState> {
    let mut tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
        .map_err(|e| EmbeddingError::ModelInit(format!("tokenizer load: {e}")))?;
    let _ = tokenizer
        .with_padding(None)
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: config.max_sequence_length,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::ModelInit(format!("tokenizer truncation: {e}")))?;

    let session = ort::session::Session::builder()
        .map_err(|e| EmbeddingError::ModelInit(format!("session builder: {e}")))?
        .with_intra_threads(config.intra_threads)
        .map_err(|e| EmbeddingError::ModelInit(format!("thread config: {e}")))?
        .with_log_level(ort::logging::LogLevel::Warning)
        .map_err(|e| EmbeddingError::ModelInit(format!("log level: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| EmbeddingError::ModelInit(format!("model load: {e}")))?;

    Ok(InferenceState { session, tokenizer })
}

/// Run inference on one batch of texts.
fn run_inference(state: &mut InferenceState, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = state
        .tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbeddingError::EncodingFailure(format!("tokenize: {e}")))?;

    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);
    if max_len == 0 {
        return Err(EmbeddingError::EncodingFailure("empty tokenization".into()));
    }

    let batch_size = texts.len();
    let mut input_ids = vec![0i64; batch_size * max_len];
    let mut attention_mask = vec![0i64; batch_size * max_len];

    for (i, enc) in encodings.iter().enumerate() {
        let offset = i * max_len;
        for (j, &id) in enc.get_ids().iter().enumerate() {
            input_ids[offset + j] = i64::from(id);
        }
        for (j, &m) in enc.get_attention_mask().iter().enumerate() {
            attention_mask[offset + j] = i64::from(m);
        }
    }

    let shape = vec![batch_size as i64, max_len as i64];
    let input_ids_tensor = ort::value::Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| EmbeddingError::EncodingFailure(format!("input_ids tensor: {e}")))?;
    let attention_mask_tensor =
        ort::value::Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| EmbeddingError::EncodingFailure(format!("attention_mask tensor: {e}")))?;

    let outputs = state
        .session
        .run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        })
        .map_err(|e| EmbeddingError::EncodingFailure(format!("inference: {e}")))?;

    // last_hidden_state: [batch_size, seq_len, hidden_dim]
    let (output_shape, output_data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbeddingError::EncodingFailure(format!("extract tensor: {e}")))?;

    let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
    if dims.len() != 3 || dims[0] != batch_size || dims[1] != max_len {
        return Err(EmbeddingError::EncodingFailure(format!(
            "unexpected output shape: {output_shape:?}"
        )));
    }

    Ok(mean_pool(output_data, &attention_mask, batch_size, max_len, dims[2]))
}

#[async_trait]
impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let state = Arc::clone(&self.state);
        let texts = texts.to_vec();
        let chunk = self.config.max_batch_size.max(1);

        tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut state = state.lock();
            let mut vectors = Vec::with_capacity(texts.len());
            for batch in texts.chunks(chunk) {
                vectors.extend(run_inference(&mut state, batch)?);
            }
            Ok(vectors)
        })
        .await
        .map_err(|e| EmbeddingError::Internal(format!("join error: {e}")))?
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn is_model_cached(&self) -> bool {
        self.model_path.exists()
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
