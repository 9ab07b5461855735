//! HTTP error type and its wire mapping.
//!
//! Every error renders as `{"error": {"code", "message"}}`, which never
//! collides with the `status`-tagged success and no-match bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use qamatch_embeddings::{BackfillReport, EmbeddingError};
use serde::Serialize;
use tracing::{error, warn};

// ── Error code constants ────────────────────────────────────────────

/// Missing or unusable request input.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
/// The model could not encode the query.
pub const ENCODING_FAILED: &str = "ENCODING_FAILED";
/// The record store could not be reached.
pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
/// The embedding model is not loaded.
pub const MODEL_NOT_READY: &str = "MODEL_NOT_READY";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request input is missing or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// Failure from the matching core.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Wire-format error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Progress made before an interrupted backfill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BackfillReport>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl ApiError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::Embedding(EmbeddingError::InvalidRequest(_)) => {
                INVALID_REQUEST
            }
            Self::Embedding(EmbeddingError::EncodingFailure(_)) => ENCODING_FAILED,
            Self::Embedding(
                EmbeddingError::StoreUnavailable(_) | EmbeddingError::BackfillInterrupted { .. },
            ) => STORE_UNAVAILABLE,
            Self::Embedding(EmbeddingError::NotReady | EmbeddingError::ModelInit(_)) => {
                MODEL_NOT_READY
            }
            Self::Embedding(EmbeddingError::MalformedVector(_) | EmbeddingError::Internal(_)) => {
                INTERNAL_ERROR
            }
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self.code() {
            INVALID_REQUEST | ENCODING_FAILED => StatusCode::BAD_REQUEST,
            STORE_UNAVAILABLE | MODEL_NOT_READY => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> ErrorBody {
        let report = match self {
            Self::Embedding(EmbeddingError::BackfillInterrupted { report, .. }) => {
                Some(report.as_ref().clone())
            }
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            report,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        } else {
            warn!(code = self.code(), error = %self, "request rejected");
        }
        ::metrics::counter!(crate::metrics::HTTP_ERRORS_TOTAL, "code" => self.code()).increment(1);
        (
            status,
            Json(ErrorEnvelope {
                error: self.to_error_body(),
            }),
        )
            .into_response()
    }
}
