//! Embedding configuration.

use qamatch_settings::{EmbeddingSettings, expand_home};
use serde::{Deserialize, Serialize};

/// Configuration for the embedding model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingConfig {
    /// Hugging Face model repository.
    pub model: String,
    /// ONNX file inside the model repository.
    pub model_file: String,
    /// Output dimensions.
    pub dimensions: usize,
    /// Local model cache directory (may contain `~`).
    pub cache_dir: String,
    /// Maximum texts per inference call.
    pub max_batch_size: usize,
    /// Token limit per text.
    pub max_sequence_length: usize,
    /// ONNX intra-op threads.
    pub intra_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_settings(&EmbeddingSettings::default())
    }
}

impl EmbeddingConfig {
    /// Create config from settings.
    pub fn from_settings(s: &EmbeddingSettings) -> Self {
        Self {
            model: s.model.clone(),
            model_file: s.model_file.clone(),
            dimensions: s.dimensions,
            cache_dir: s.cache_dir.clone(),
            max_batch_size: s.max_batch_size,
            max_sequence_length: s.max_sequence_length,
            intra_threads: s.intra_threads,
        }
    }

    /// Resolve the cache directory, expanding `~/` to the home directory.
    pub fn resolved_cache_dir(&self) -> String {
        expand_home(&self.cache_dir)
    }
}
