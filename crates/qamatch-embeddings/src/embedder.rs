//! Text → vector encoding over a shared, already-loaded model.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{EmbeddingError, Result};
use crate::service::EmbeddingService;
use crate::vector::Vector;

/// Validating front for an [`EmbeddingService`].
///
/// Rejects blank input before it reaches the model and checks every output
/// for count, dimension and finiteness. Batches fail fast: one bad text
/// fails the whole call.
#[derive(Clone)]
pub struct Embedder {
    service: Arc<dyn EmbeddingService>,
    dims: usize,
}

impl Embedder {
    /// Wrap a loaded service. The dimension is fixed for the process
    /// lifetime.
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        let dims = service.dimensions();
        Self { service, dims }
    }

    /// Output dimension of every vector this embedder produces.
    pub fn dimensions(&self) -> usize {
        self.dims
    }

    /// Identifier of the loaded model.
    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Whether the underlying service can run inference.
    pub fn is_ready(&self) -> bool {
        self.service.is_ready()
    }

    /// Encode one text.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        check_text(0, text)?;
        let vectors = self.service.embed(&[text.to_string()]).await?;
        self.check_outputs(vectors, 1)?
            .pop()
            .ok_or_else(|| EmbeddingError::EncodingFailure("empty result".into()))
    }

    /// Encode texts in order, one vector per input.
    pub async fn encode_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for (index, text) in texts.iter().enumerate() {
            check_text(index, text)?;
        }
        debug!(count = texts.len(), "encoding batch");
        let vectors = self.service.embed(texts).await?;
        self.check_outputs(vectors, texts.len())
    }

    fn check_outputs(&self, vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if vectors.len() != expected {
            return Err(EmbeddingError::EncodingFailure(format!(
                "model returned {} vectors for {expected} texts",
                vectors.len()
            )));
        }
        vectors
            .into_iter()
            .enumerate()
            .map(|(index, v)| match Vector::check(v, self.dims) {
                Vector::Valid(v) => Ok(v),
                Vector::Malformed(fault) => Err(EmbeddingError::EncodingFailure(format!(
                    "model output {index}: {fault}"
                ))),
            })
            .collect()
    }
}

fn check_text(index: usize, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EncodingFailure(format!(
            "text {index} is empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::service::MockEmbeddingService;

    fn embedder(dims: usize) -> Embedder {
        Embedder::new(Arc::new(MockEmbeddingService::new(dims)))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    /// Service that returns whatever it was built with, ignoring input.
    struct Canned(Vec<Vec<f32>>, usize);

    #[async_trait]
    impl EmbeddingService for Canned {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(self.0.clone())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn is_model_cached(&self) -> bool {
            true
        }
        fn dimensions(&self) -> usize {
            self.1
        }
        fn model_id(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn encode_is_deterministic() {
        let e = embedder(32);
        let a = e.encode("오늘 날씨 어때요?").await.unwrap();
        let b = e.encode("오늘 날씨 어때요?").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn encode_many_preserves_order_and_length() {
        let e = embedder(16);
        let input = texts(&["one", "two", "three"]);
        let batch = e.encode_many(&input).await.unwrap();
        assert_eq!(batch.len(), 3);
        for (text, vector) in input.iter().zip(&batch) {
            assert_eq!(&e.encode(text).await.unwrap(), vector);
        }
    }

    #[tokio::test]
    async fn encode_many_empty_skips_model() {
        let svc = Arc::new(MockEmbeddingService::new(8));
        let e = Embedder::new(svc.clone());
        assert!(e.encode_many(&[]).await.unwrap().is_empty());
        assert!(svc.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_encoding_failure() {
        let e = embedder(8);
        assert!(matches!(
            e.encode("   ").await,
            Err(EmbeddingError::EncodingFailure(_))
        ));
        assert!(matches!(
            e.encode("").await,
            Err(EmbeddingError::EncodingFailure(_))
        ));
    }

    #[tokio::test]
    async fn one_blank_text_fails_whole_batch() {
        let svc = Arc::new(MockEmbeddingService::new(8));
        let e = Embedder::new(svc.clone());
        let result = e.encode_many(&texts(&["fine", "", "also fine"])).await;
        assert!(matches!(result, Err(EmbeddingError::EncodingFailure(_))));
        assert!(svc.calls().is_empty(), "model must not be called");
    }

    #[tokio::test]
    async fn service_failure_fails_batch() {
        let e = Embedder::new(Arc::new(MockEmbeddingService::new(8).failing_on("poison")));
        let result = e.encode_many(&texts(&["a", "poison pill", "b"])).await;
        assert!(matches!(result, Err(EmbeddingError::EncodingFailure(_))));
    }

    #[tokio::test]
    async fn wrong_output_count_is_rejected() {
        let e = Embedder::new(Arc::new(Canned(vec![vec![1.0, 0.0]], 2)));
        let result = e.encode_many(&texts(&["a", "b"])).await;
        assert!(matches!(result, Err(EmbeddingError::EncodingFailure(_))));
    }

    #[tokio::test]
    async fn wrong_output_dimension_is_rejected() {
        let e = Embedder::new(Arc::new(Canned(vec![vec![1.0, 0.0, 0.0]], 2)));
        let err = e.encode("a").await.unwrap_err();
        assert!(err.to_string().contains("expected 2 dimensions, got 3"), "{err}");
    }

    #[tokio::test]
    async fn non_finite_output_is_rejected() {
        let e = Embedder::new(Arc::new(Canned(vec![vec![f32::NAN, 0.0]], 2)));
        assert!(matches!(
            e.encode("a").await,
            Err(EmbeddingError::EncodingFailure(_))
        ));
    }

    #[test]
    fn dimensions_and_model_come_from_service() {
        let e = embedder(24);
        assert_eq!(e.dimensions(), 24);
        assert_eq!(e.model_id(), "mock");
        assert!(e.is_ready());
    }
}
