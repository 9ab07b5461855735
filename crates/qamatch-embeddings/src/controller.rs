//! Q/A controller: orchestrates the embedder, matcher and record store.
//!
//! `SQLite` calls run on the blocking pool so a slow store never stalls the
//! async workers.

use std::collections::VecDeque;

use async_trait::async_trait;
use qamatch_store::{QaRecord, RecordCursor, RecordId, RecordRepository, RecordScope, StoreError};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use crate::backfill::{BackfillOptions, BackfillReport, RecordSource, backfill};
use crate::embedder::Embedder;
use crate::errors::{EmbeddingError, Result};
use crate::matcher::{Candidate, best_match};
use crate::vector::decode_token;

/// A matched record as returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Record identifier.
    pub id: RecordId,
    /// Partition the record belongs to.
    pub partition_key: String,
    /// Opaque secondary key, unchanged.
    pub secondary_key: String,
    /// `secondary_key` parsed as an integer, when it is one.
    pub secondary_key_numeric: Option<i64>,
    /// Stored question.
    pub question_text: String,
    /// Stored answer.
    pub answer_text: String,
    /// Owner identifier, unchanged.
    pub owner_id: i64,
    /// Cosine similarity between query and question.
    pub similarity_score: f32,
}

impl MatchResult {
    fn from_record(record: QaRecord, similarity_score: f32) -> Self {
        let secondary_key_numeric = record.secondary_key.trim().parse().ok();
        Self {
            id: record.id,
            partition_key: record.partition_key,
            secondary_key: record.secondary_key,
            secondary_key_numeric,
            question_text: record.question_text,
            answer_text: record.answer_text,
            owner_id: record.owner_id,
            similarity_score,
        }
    }
}

/// Result of a match request. `NoMatch` is a normal outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    /// Best candidate in the partition.
    Found(MatchResult),
    /// The partition has no record with a usable vector.
    NoMatch,
}

/// Record listing entry, without the vector payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Record identifier.
    pub id: RecordId,
    /// Partition key.
    pub partition_key: String,
    /// Opaque secondary key.
    pub secondary_key: String,
    /// Owner identifier.
    pub owner_id: i64,
    /// Question text.
    pub question_text: String,
    /// Answer text.
    pub answer_text: String,
    /// Whether the stored vector is usable for matching.
    pub has_vector: bool,
}

/// Orchestrates matching and backfill over one record store.
#[derive(Clone)]
pub struct QaController {
    embedder: Embedder,
    repo: RecordRepository,
    options: BackfillOptions,
    page_size: usize,
}

impl QaController {
    /// Create a controller. `page_size` bounds how many records a backfill
    /// holds in memory per store query.
    pub fn new(
        embedder: Embedder,
        repo: RecordRepository,
        options: BackfillOptions,
        page_size: usize,
    ) -> Self {
        Self {
            embedder,
            repo,
            options,
            page_size: page_size.max(1),
        }
    }

    /// The embedder.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// The record repository.
    pub fn repository(&self) -> &RecordRepository {
        &self.repo
    }

    /// Find the record in `partition_key` whose question is most similar to
    /// `query`.
    pub async fn find_best(&self, query: &str, partition_key: &str) -> Result<MatchOutcome> {
        if query.trim().is_empty() {
            return Err(EmbeddingError::InvalidRequest("query is empty".into()));
        }

        let repo = self.repo.clone();
        let key = partition_key.to_string();
        let records = task::spawn_blocking(move || repo.by_partition(&key))
            .await
            .map_err(|e| EmbeddingError::Internal(format!("Partition lookup task failed: {e}")))??;
        if records.is_empty() {
            debug!(partition_key, "no records in partition");
            return Ok(MatchOutcome::NoMatch);
        }

        let query_vector = self.embedder.encode(query).await?;
        let dims = self.embedder.dimensions();
        let candidates = records.into_iter().map(|record| Candidate {
            id: record.id,
            vector: decode_token(record.vector.as_deref(), dims),
            payload: record,
        });

        Ok(match best_match(&query_vector, candidates) {
            Some(m) => {
                debug!(partition_key, id = m.id, score = m.score, "matched");
                MatchOutcome::Found(MatchResult::from_record(m.payload, m.score))
            }
            None => {
                debug!(partition_key, "no candidate with a usable vector");
                MatchOutcome::NoMatch
            }
        })
    }

    /// Backfill vectors for every record in `scope`.
    ///
    /// A store failure partway through returns
    /// [`EmbeddingError::BackfillInterrupted`] after the records already read
    /// have been written.
    pub async fn backfill(&self, scope: RecordScope) -> Result<BackfillReport> {
        let source = PagedRecords::new(self.repo.cursor(scope, self.page_size), self.page_size);
        let repo = &self.repo;
        backfill(
            &self.embedder,
            source,
            |id, token| {
                let repo = repo.clone();
                async move {
                    match task::spawn_blocking(move || repo.update_vector(id, &token)).await {
                        Ok(result) => result,
                        Err(e) => Err(StoreError::Io(std::io::Error::other(e))),
                    }
                }
            },
            &self.options,
        )
        .await
    }

    /// List records in `scope` with their vector status.
    pub async fn records(&self, scope: &RecordScope) -> Result<Vec<RecordSummary>> {
        let dims = self.embedder.dimensions();
        let repo = self.repo.clone();
        let scope = scope.clone();
        let rows = task::spawn_blocking(move || repo.list(&scope))
            .await
            .map_err(|e| EmbeddingError::Internal(format!("Record listing task failed: {e}")))??;
        Ok(rows
            .into_iter()
            .map(|r| RecordSummary {
                has_vector: decode_token(r.vector.as_deref(), dims).is_valid(),
                id: r.id,
                partition_key: r.partition_key,
                secondary_key: r.secondary_key,
                owner_id: r.owner_id,
                question_text: r.question_text,
                answer_text: r.answer_text,
            })
            .collect())
    }
}

/// Reads a [`RecordCursor`] one page per blocking task.
///
/// The cursor moves into the task and comes back with the page; once a page
/// comes back empty the cursor is dropped.
struct PagedRecords {
    cursor: Option<RecordCursor>,
    page: VecDeque<std::result::Result<QaRecord, StoreError>>,
    page_size: usize,
}

impl PagedRecords {
    fn new(cursor: RecordCursor, page_size: usize) -> Self {
        Self {
            cursor: Some(cursor),
            page: VecDeque::new(),
            page_size,
        }
    }
}

#[async_trait]
impl RecordSource for PagedRecords {
    async fn next_record(&mut self) -> Option<std::result::Result<QaRecord, StoreError>> {
        if self.page.is_empty() {
            let mut cursor = self.cursor.take()?;
            let page_size = self.page_size;
            let fetched = task::spawn_blocking(move || {
                let page: Vec<_> = cursor.by_ref().take(page_size).collect();
                (cursor, page)
            })
            .await;
            match fetched {
                Ok((cursor, page)) => {
                    if !page.is_empty() {
                        self.cursor = Some(cursor);
                    }
                    self.page.extend(page);
                }
                Err(e) => return Some(Err(StoreError::Io(std::io::Error::other(e)))),
            }
        }
        self.page.pop_front()
    }
}
