//! Record repository over the pooled `qa_records` table.

use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::connection::{ConnectionPool, PooledConnection};
use crate::cursor::RecordCursor;
use crate::errors::{Result, StoreError};
use crate::types::{NewRecord, QaRecord, RecordId, RecordScope};

/// Record repository. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct RecordRepository {
    pool: ConnectionPool,
}

impl RecordRepository {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub(crate) fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// All records sharing `partition_key`, in id order.
    pub fn by_partition(&self, partition_key: &str) -> Result<Vec<QaRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM qa_records WHERE partition_key = ?1 ORDER BY id",
            QaRecord::COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![partition_key], QaRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(partition_key, count = rows.len(), "fetched partition");
        Ok(rows)
    }

    /// Fetch a single record by id.
    pub fn get(&self, id: RecordId) -> Result<Option<QaRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM qa_records WHERE id = ?1", QaRecord::COLUMNS),
                params![id],
                QaRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert a record and return its assigned id.
    pub fn insert(&self, record: &NewRecord) -> Result<RecordId> {
        let conn = self.conn()?;
        let _ = conn.execute(
            "INSERT INTO qa_records
               (partition_key, secondary_key, owner_id, question_text, answer_text, vector)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.partition_key,
                record.secondary_key,
                record.owner_id,
                record.question_text,
                record.answer_text,
                record.vector,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert many records in one transaction. Returns the assigned ids in
    /// input order.
    pub fn insert_many(&self, records: &[NewRecord]) -> Result<Vec<RecordId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO qa_records
                   (partition_key, secondary_key, owner_id, question_text, answer_text, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                let _ = stmt.execute(params![
                    record.partition_key,
                    record.secondary_key,
                    record.owner_id,
                    record.question_text,
                    record.answer_text,
                    record.vector,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Overwrite the stored vector token of one record.
    pub fn update_vector(&self, id: RecordId, token: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE qa_records SET vector = ?1 WHERE id = ?2",
            params![token, id],
        )?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }

    /// List records, optionally restricted to one partition, in id order.
    pub fn list(&self, scope: &RecordScope) -> Result<Vec<QaRecord>> {
        match scope {
            RecordScope::Partition(key) => self.by_partition(key),
            RecordScope::All => {
                let conn = self.conn()?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM qa_records ORDER BY id",
                    QaRecord::COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], QaRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        }
    }

    /// Count records in scope.
    #[allow(clippy::cast_sign_loss)]
    pub fn count(&self, scope: &RecordScope) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = match scope {
            RecordScope::All => {
                conn.query_row("SELECT count(*) FROM qa_records", [], |row| row.get(0))?
            }
            RecordScope::Partition(key) => conn.query_row(
                "SELECT count(*) FROM qa_records WHERE partition_key = ?1",
                params![key],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }

    /// Lazily page through records in scope, `page_size` rows per query.
    pub fn cursor(&self, scope: RecordScope, page_size: usize) -> RecordCursor {
        RecordCursor::new(self.clone(), scope, page_size)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
