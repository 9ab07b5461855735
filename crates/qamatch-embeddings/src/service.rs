//! Embedding service trait and mock implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::errors::{EmbeddingError, Result};
use crate::normalize::l2_normalize;

/// Trait for embedding text into vectors.
///
/// Implementations hold an already-loaded model and must be safe to call
/// concurrently.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts, one vector per text in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (default: calls `embed` with one item).
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EncodingFailure("empty result".into()))
    }

    /// Whether the service is ready for inference.
    fn is_ready(&self) -> bool;

    /// Whether the model is cached locally.
    fn is_model_cached(&self) -> bool;

    /// Output embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifier of the loaded model.
    fn model_id(&self) -> &str;
}

/// Mock embedding service for testing.
///
/// Generates deterministic embeddings by hashing input text with SHA-256,
/// using the hash bytes as seeds for the vector components. Individual
/// texts can be pinned to fixed vectors or made to fail.
pub struct MockEmbeddingService {
    dims: usize,
    ready: AtomicBool,
    pinned: HashMap<String, Vec<f32>>,
    fail_markers: Vec<String>,
    calls: Mutex<Vec<usize>>,
}

impl MockEmbeddingService {
    /// Create a new mock service with the given dimensions.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            ready: AtomicBool::new(true),
            pinned: HashMap::new(),
            fail_markers: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return `vector` verbatim whenever `text` is embedded.
    #[must_use]
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        let _ = self.pinned.insert(text.into(), vector);
        self
    }

    /// Fail any batch containing a text that includes `marker`.
    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Set whether this mock is ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Batch sizes of every `embed` call so far.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hasher.finalize();

        let mut v: Vec<f32> = (0..self.dims)
            .map(|i| {
                let byte_idx = i % hash.len();
                // Map byte to [-1, 1] range
                (f32::from(hash[byte_idx]) / 127.5) - 1.0
            })
            .collect();

        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().push(texts.len());
        if !self.is_ready() {
            return Err(EmbeddingError::NotReady);
        }
        if let Some(text) = texts
            .iter()
            .find(|t| self.fail_markers.iter().any(|m| t.contains(m.as_str())))
        {
            return Err(EmbeddingError::EncodingFailure(format!(
                "mock refused text: {text}"
            )));
        }
        Ok(texts
            .iter()
            .map(|t| {
                self.pinned
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| self.hash_to_vector(t))
            })
            .collect())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_model_cached(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::l2_norm;

    #[tokio::test]
    async fn mock_batch_correct_count() {
        let svc = MockEmbeddingService::new(64);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = svc.embed(&texts).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.len() == 64));
        assert_eq!(svc.calls(), vec![3]);
    }

    #[tokio::test]
    async fn mock_deterministic_same_input() {
        let svc = MockEmbeddingService::new(64);
        let a = svc.embed_single("hello world").await.unwrap();
        let b = svc.embed_single("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_different_inputs_different_outputs() {
        let svc = MockEmbeddingService::new(64);
        let a = svc.embed_single("hello").await.unwrap();
        let b = svc.embed_single("world").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn mock_vectors_are_unit_length() {
        let svc = MockEmbeddingService::new(32);
        let v = svc.embed_single("안녕하세요").await.unwrap();
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn mock_not_ready_returns_error() {
        let svc = MockEmbeddingService::new(8);
        svc.set_ready(false);
        let result = svc.embed_single("test").await;
        assert!(matches!(result, Err(EmbeddingError::NotReady)));
    }

    #[tokio::test]
    async fn pinned_vector_is_returned() {
        let svc = MockEmbeddingService::new(2).with_vector("fixed", vec![0.0, 1.0]);
        assert_eq!(svc.embed_single("fixed").await.unwrap(), vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn failing_marker_fails_whole_batch() {
        let svc = MockEmbeddingService::new(4).failing_on("BAD");
        let texts = vec!["ok".to_string(), "BAD text".to_string()];
        let result = svc.embed(&texts).await;
        assert!(matches!(result, Err(EmbeddingError::EncodingFailure(_))));
        assert!(svc.embed_single("ok").await.is_ok());
    }
}
