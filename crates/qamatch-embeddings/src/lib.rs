//! # qamatch-embeddings
//!
//! Semantic matching of free-text queries against stored question/answer
//! records.
//!
//! - [`Embedder`]: validated text → vector over a shared [`EmbeddingService`]
//! - [`best_match`]: strict-maximum cosine selection, skipping malformed vectors
//! - [`backfill`](backfill::backfill): encode records with missing vectors,
//!   batched with per-record fallback
//! - [`QaController`]: wires the above to the record store
//!
//! The ONNX backend lives behind the `ort` feature; tests use the
//! deterministic [`MockEmbeddingService`].

#![deny(unsafe_code)]

pub mod backfill;
pub mod config;
pub mod controller;
pub mod embedder;
pub mod errors;
pub mod matcher;
pub mod normalize;
#[cfg(feature = "ort")]
pub mod ort_service;
pub mod service;
pub mod vector;

pub use backfill::{BackfillOptions, BackfillReport, RecordSource};
pub use config::EmbeddingConfig;
pub use controller::{MatchOutcome, MatchResult, QaController, RecordSummary};
pub use embedder::Embedder;
pub use errors::{EmbeddingError, Result};
pub use matcher::{Candidate, Match, best_match};
#[cfg(feature = "ort")]
pub use ort_service::OnnxEmbeddingService;
pub use service::{EmbeddingService, MockEmbeddingService};
pub use vector::{Vector, VectorFault, decode_token, encode_token};
