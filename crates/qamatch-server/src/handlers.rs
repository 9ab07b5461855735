//! HTTP handlers.

use std::time::Instant;

use axum::extract::{FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use ::metrics::{counter, histogram};
use qamatch_embeddings::{
    BackfillReport, EmbeddingError, MatchOutcome, MatchResult, RecordSummary,
};
use qamatch_store::RecordScope;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::errors::ApiError;
use crate::health::{self, HealthResponse};
use crate::metrics::{
    BACKFILL_RECORDS_FAILED_TOTAL, BACKFILL_RECORDS_UPDATED_TOTAL, BACKFILL_RUNS_TOTAL,
    MATCH_DURATION_SECONDS, MATCH_REQUESTS_TOTAL,
};
use crate::server::AppState;

/// Body of `POST /match`, accepted as JSON or as a urlencoded form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MatchParams {
    /// Free-text query.
    #[serde(default, alias = "title")]
    pub query: Option<String>,
    /// Partition to search.
    #[serde(default, alias = "f_obj")]
    pub partition_key: Option<String>,
}

impl<S: Send + Sync> FromRequest<S> for MatchParams {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(params) = Json::<Self>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(params)
        } else {
            let Form(params) = Form::<Self>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(params)
        }
    }
}

/// Body of a successful `POST /match`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResponse {
    /// Best record in the partition.
    Matched {
        /// The matched record.
        #[serde(rename = "match")]
        matched: MatchResult,
    },
    /// No record in the partition has a usable vector.
    NoMatch,
}

impl From<MatchOutcome> for MatchResponse {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Found(matched) => Self::Matched { matched },
            MatchOutcome::NoMatch => Self::NoMatch,
        }
    }
}

/// `partition_key` query parameter shared by backfill and listing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScopeParams {
    /// Restrict to one partition; absent means all records.
    #[serde(default)]
    pub partition_key: Option<String>,
}

/// Body of `GET /records`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    /// Number of records listed.
    pub count: usize,
    /// Records, without vector payloads.
    pub records: Vec<RecordSummary>,
}

/// POST /match
#[instrument(skip_all, fields(partition_key = params.partition_key.as_deref().unwrap_or("")))]
pub async fn match_handler(
    State(state): State<AppState>,
    params: MatchParams,
) -> Result<Json<MatchResponse>, ApiError> {
    let query = params
        .query
        .ok_or_else(|| ApiError::BadRequest("missing field `query`".into()))?;
    let partition_key = params
        .partition_key
        .ok_or_else(|| ApiError::BadRequest("missing field `partition_key`".into()))?;

    let started = Instant::now();
    let result = state.controller.find_best(&query, &partition_key).await;
    histogram!(MATCH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    let outcome = match &result {
        Ok(MatchOutcome::Found(_)) => "matched",
        Ok(MatchOutcome::NoMatch) => "no_match",
        Err(_) => "error",
    };
    counter!(MATCH_REQUESTS_TOTAL, "outcome" => outcome).increment(1);

    Ok(Json(result?.into()))
}

/// POST /backfill
#[instrument(skip_all, fields(partition_key = params.partition_key.as_deref().unwrap_or("*")))]
pub async fn backfill_handler(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<BackfillReport>, ApiError> {
    let scope = RecordScope::from_partition(params.partition_key);
    counter!(BACKFILL_RUNS_TOTAL).increment(1);

    let report = match state.controller.backfill(scope).await {
        Ok(report) => report,
        Err(e) => {
            if let EmbeddingError::BackfillInterrupted { report, .. } = &e {
                record_backfill_progress(report);
            }
            return Err(e.into());
        }
    };
    record_backfill_progress(&report);
    info!(
        scanned = report.scanned,
        updated = report.updated,
        failed = report.failed(),
        "backfill finished"
    );
    Ok(Json(report))
}

fn record_backfill_progress(report: &BackfillReport) {
    counter!(BACKFILL_RECORDS_UPDATED_TOTAL).increment(report.updated as u64);
    counter!(BACKFILL_RECORDS_FAILED_TOTAL).increment(report.failed() as u64);
}

/// GET /records
#[instrument(skip_all)]
pub async fn records_handler(
    State(state): State<AppState>,
    Query(params): Query<ScopeParams>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let scope = RecordScope::from_partition(params.partition_key);
    let records = state.controller.records(&scope).await?;
    Ok(Json(RecordsResponse {
        count: records.len(),
        records,
    }))
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let embedder = state.controller.embedder();
    Json(health::health_check(
        state.start_time,
        embedder.model_id(),
        embedder.dimensions(),
        embedder.is_ready(),
    ))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> MatchResult {
        MatchResult {
            id: 1,
            partition_key: "A".into(),
            secondary_key: "42".into(),
            secondary_key_numeric: Some(42),
            question_text: "오늘 날씨 어때?".into(),
            answer_text: "맑음".into(),
            owner_id: 7,
            similarity_score: 0.87,
        }
    }

    #[test]
    fn matched_response_shape() {
        let resp = MatchResponse::from(MatchOutcome::Found(sample_match()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "matched");
        assert_eq!(json["match"]["id"], 1);
        assert_eq!(json["match"]["answer_text"], "맑음");
        assert_eq!(json["match"]["secondary_key_numeric"], 42);
    }

    #[test]
    fn no_match_response_shape() {
        let resp = MatchResponse::from(MatchOutcome::NoMatch);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_match"}));
    }

    #[test]
    fn params_accept_legacy_names() {
        let params: MatchParams =
            serde_json::from_str(r#"{"title":"hello","f_obj":"A"}"#).unwrap();
        assert_eq!(params.query.as_deref(), Some("hello"));
        assert_eq!(params.partition_key.as_deref(), Some("A"));
    }

    #[test]
    fn params_fields_are_optional() {
        let params: MatchParams = serde_json::from_str("{}").unwrap();
        assert!(params.query.is_none());
        assert!(params.partition_key.is_none());
    }
}
