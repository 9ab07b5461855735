//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` when the model is ready, `"degraded"` otherwise.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Loaded embedding model.
    pub model: String,
    /// Embedding dimension.
    pub dimensions: usize,
}

/// Build a health response.
pub fn health_check(
    start_time: Instant,
    model: &str,
    dimensions: usize,
    ready: bool,
) -> HealthResponse {
    HealthResponse {
        status: if ready { "ok" } else { "degraded" },
        uptime_secs: start_time.elapsed().as_secs(),
        model: model.to_string(),
        dimensions,
    }
}
