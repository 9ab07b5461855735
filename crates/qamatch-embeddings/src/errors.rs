//! Embedding and matching error types.
//!
//! `NoMatch` is deliberately absent: an empty result is a
//! [`MatchOutcome`](crate::controller::MatchOutcome), not an error.

use qamatch_store::StoreError;
use thiserror::Error;

use crate::backfill::BackfillReport;
use crate::vector::VectorFault;

/// Errors from embedding, matching and backfill operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not encode the given text.
    #[error("encoding failed: {0}")]
    EncodingFailure(String),

    /// A vector failed validation.
    #[error("malformed vector: {0}")]
    MalformedVector(#[from] VectorFault),

    /// The record store could not be reached (preserves source chain).
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The record store failed partway through a backfill. `report` counts
    /// the work committed before the failure.
    #[error("backfill interrupted after {} updates: {source}", .report.updated)]
    BackfillInterrupted {
        /// The store failure that stopped the run.
        source: StoreError,
        /// Progress up to the failure.
        report: Box<BackfillReport>,
    },

    /// Model initialization failed.
    #[error("model initialization failed: {0}")]
    ModelInit(String),

    /// Service not ready (model not loaded).
    #[error("embedding service not ready")]
    NotReady,

    /// The caller supplied unusable input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn error_display_variants() {
        let cases = vec![
            (
                EmbeddingError::EncodingFailure("empty text".into()),
                "encoding failed: empty text",
            ),
            (
                EmbeddingError::MalformedVector(VectorFault::WrongLength {
                    expected: 3,
                    actual: 2,
                }),
                "malformed vector: expected 3 dimensions, got 2",
            ),
            (
                EmbeddingError::ModelInit("no file".into()),
                "model initialization failed: no file",
            ),
            (EmbeddingError::NotReady, "embedding service not ready"),
            (
                EmbeddingError::InvalidRequest("query is empty".into()),
                "invalid request: query is empty",
            ),
            (EmbeddingError::Internal("oops".into()), "oops"),
            (
                EmbeddingError::BackfillInterrupted {
                    source: StoreError::RecordNotFound(3),
                    report: Box::new(BackfillReport {
                        updated: 2,
                        ..BackfillReport::default()
                    }),
                },
                "backfill interrupted after 2 updates: record not found: 3",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmbeddingError>();
    }

    #[test]
    fn store_error_converts_and_keeps_source() {
        let err: EmbeddingError = StoreError::RecordNotFound(9).into();
        assert!(matches!(err, EmbeddingError::StoreUnavailable(_)));
        let source = err.source().expect("should have source");
        assert_eq!(source.to_string(), "record not found: 9");
    }

    #[test]
    fn interrupted_backfill_keeps_source() {
        let err = EmbeddingError::BackfillInterrupted {
            source: StoreError::RecordNotFound(4),
            report: Box::default(),
        };
        assert_eq!(err.source().unwrap().to_string(), "record not found: 4");
    }
}
