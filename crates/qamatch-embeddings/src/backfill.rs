//! Vector backfill: encode records whose stored vector is missing or
//! malformed and write the token back.
//!
//! Per-record encode and write failures are logged and counted. A failure
//! to read records stops the job once the records already read are flushed.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use qamatch_settings::BackfillSettings;
use qamatch_store::{QaRecord, RecordId, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::Embedder;
use crate::errors::{EmbeddingError, Result};
use crate::vector::{decode_token, encode_token};

/// Backfill tuning.
#[derive(Clone, Debug)]
pub struct BackfillOptions {
    /// Texts per `encode_many` call.
    pub batch_size: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self::from_settings(&BackfillSettings::default())
    }
}

impl BackfillOptions {
    /// Create options from settings.
    pub fn from_settings(s: &BackfillSettings) -> Self {
        Self {
            batch_size: s.batch_size,
        }
    }
}

/// Outcome of a backfill run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Records read.
    pub scanned: usize,
    /// Records whose vector was absent or malformed.
    pub eligible: usize,
    /// Records written with a fresh vector.
    pub updated: usize,
    /// Eligible records the model could not encode.
    pub encode_failures: usize,
    /// Encoded records whose write failed.
    pub write_failures: usize,
}

impl BackfillReport {
    /// Total per-record failures.
    pub fn failed(&self) -> usize {
        self.encode_failures + self.write_failures
    }
}

/// Records fed to [`backfill`].
///
/// Any `Send` iterator of store results is a source.
#[async_trait]
pub trait RecordSource: Send {
    /// The next record, a store error, or `None` once exhausted.
    async fn next_record(&mut self) -> Option<std::result::Result<QaRecord, StoreError>>;
}

#[async_trait]
impl<I> RecordSource for I
where
    I: Iterator<Item = std::result::Result<QaRecord, StoreError>> + Send,
{
    async fn next_record(&mut self) -> Option<std::result::Result<QaRecord, StoreError>> {
        self.next()
    }
}

/// Run a backfill over `records`, persisting each new token through `write`.
///
/// Eligible records are encoded `options.batch_size` at a time. When a batch
/// fails, its records are retried one by one so a single bad text does not
/// hold back the rest.
///
/// A store error from `records` flushes the pending batch and then returns
/// [`EmbeddingError::BackfillInterrupted`] with the progress so far.
pub async fn backfill<S, W, Fut, E>(
    embedder: &Embedder,
    mut records: S,
    mut write: W,
    options: &BackfillOptions,
) -> Result<BackfillReport>
where
    S: RecordSource,
    W: FnMut(RecordId, String) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let dims = embedder.dimensions();
    let batch_size = options.batch_size.max(1);
    let mut report = BackfillReport::default();
    let mut pending: Vec<QaRecord> = Vec::with_capacity(batch_size);

    while let Some(item) = records.next_record().await {
        let record = match item {
            Ok(record) => record,
            Err(source) => {
                flush(embedder, &mut pending, &mut write, &mut report).await;
                warn!(error = %source, ?report, "backfill interrupted: record store unavailable");
                return Err(EmbeddingError::BackfillInterrupted {
                    source,
                    report: Box::new(report),
                });
            }
        };
        report.scanned += 1;

        if decode_token(record.vector.as_deref(), dims).is_valid() {
            continue;
        }
        report.eligible += 1;
        pending.push(record);

        if pending.len() >= batch_size {
            flush(embedder, &mut pending, &mut write, &mut report).await;
        }
    }
    flush(embedder, &mut pending, &mut write, &mut report).await;

    info!(
        scanned = report.scanned,
        eligible = report.eligible,
        updated = report.updated,
        failed = report.failed(),
        "backfill complete"
    );
    Ok(report)
}

async fn flush<W, Fut, E>(
    embedder: &Embedder,
    pending: &mut Vec<QaRecord>,
    write: &mut W,
    report: &mut BackfillReport,
) where
    W: FnMut(RecordId, String) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    let texts: Vec<String> = batch.iter().map(|r| r.question_text.clone()).collect();

    match embedder.encode_many(&texts).await {
        Ok(vectors) => {
            for (record, vector) in batch.iter().zip(vectors) {
                persist(record.id, &vector, write, report).await;
            }
        }
        Err(e) if batch.len() > 1 => {
            debug!(size = batch.len(), error = %e, "batch encode failed, retrying per record");
            for record in &batch {
                match embedder.encode(&record.question_text).await {
                    Ok(vector) => persist(record.id, &vector, write, report).await,
                    Err(e) => {
                        warn!(id = record.id, error = %e, "backfill encode failed");
                        report.encode_failures += 1;
                    }
                }
            }
        }
        Err(e) => {
            for record in &batch {
                warn!(id = record.id, error = %e, "backfill encode failed");
                report.encode_failures += 1;
            }
        }
    }
}

async fn persist<W, Fut, E>(id: RecordId, vector: &[f32], write: &mut W, report: &mut BackfillReport)
where
    W: FnMut(RecordId, String) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let token = match encode_token(vector) {
        Ok(token) => token,
        Err(e) => {
            warn!(id, error = %e, "backfill produced an unserializable vector");
            report.encode_failures += 1;
            return;
        }
    };
    match write(id, token).await {
        Ok(()) => report.updated += 1,
        Err(e) => {
            warn!(id, error = %e, "backfill write failed");
            report.write_failures += 1;
        }
    }
}
