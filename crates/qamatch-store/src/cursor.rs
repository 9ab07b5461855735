//! Keyset-paginated record cursor.
//!
//! Yields records in id order, fetching `page_size` rows at a time with
//! `WHERE id > last_seen`. No connection is held between pages, so writes to
//! already-yielded records (backfill) never contend with the scan.

use std::collections::VecDeque;

use rusqlite::params;
use tracing::trace;

use crate::errors::Result;
use crate::repository::RecordRepository;
use crate::types::{QaRecord, RecordId, RecordScope};

/// Lazy iterator over the records in a [`RecordScope`].
///
/// A store error is yielded once as `Err`, after which the cursor is
/// exhausted.
pub struct RecordCursor {
    repo: RecordRepository,
    scope: RecordScope,
    page_size: usize,
    last_id: RecordId,
    buffer: VecDeque<QaRecord>,
    done: bool,
}

impl RecordCursor {
    pub(crate) fn new(repo: RecordRepository, scope: RecordScope, page_size: usize) -> Self {
        Self {
            repo,
            scope,
            page_size: page_size.max(1),
            last_id: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch_page(&self) -> Result<Vec<QaRecord>> {
        let conn = self.repo.conn()?;
        let limit = i64::try_from(self.page_size).unwrap_or(i64::MAX);
        let rows = match &self.scope {
            RecordScope::All => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM qa_records WHERE id > ?1 ORDER BY id LIMIT ?2",
                    QaRecord::COLUMNS
                ))?;
                stmt.query_map(params![self.last_id, limit], QaRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            RecordScope::Partition(key) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM qa_records WHERE partition_key = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
                    QaRecord::COLUMNS
                ))?;
                stmt.query_map(params![key, self.last_id, limit], QaRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        trace!(after = self.last_id, rows = rows.len(), "fetched cursor page");
        Ok(rows)
    }
}

impl Iterator for RecordCursor {
    type Item = Result<QaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.buffer.pop_front() {
            return Some(Ok(record));
        }
        if self.done {
            return None;
        }

        match self.fetch_page() {
            Ok(rows) => {
                if rows.len() < self.page_size {
                    self.done = true;
                }
                if let Some(last) = rows.last() {
                    self.last_id = last.id;
                }
                self.buffer.extend(rows);
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::open_in_memory;
    use crate::errors::StoreError;
    use crate::repository::RecordRepository;
    use crate::types::{NewRecord, RecordScope};

    fn seeded(n: usize) -> RecordRepository {
        let repo = RecordRepository::new(open_in_memory().unwrap());
        let records: Vec<_> = (0..n)
            .map(|i| NewRecord {
                partition_key: if i % 2 == 0 { "even" } else { "odd" }.into(),
                question_text: format!("q{i}"),
                answer_text: format!("a{i}"),
                ..NewRecord::default()
            })
            .collect();
        let _ = repo.insert_many(&records).unwrap();
        repo
    }

    #[test]
    fn yields_every_record_across_pages() {
        let repo = seeded(10);
        let ids: Vec<_> = repo
            .cursor(RecordScope::All, 3)
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn exact_page_multiple_terminates() {
        let repo = seeded(6);
        assert_eq!(repo.cursor(RecordScope::All, 3).count(), 6);
    }

    #[test]
    fn partition_scope_filters() {
        let repo = seeded(7);
        let texts: Vec<_> = repo
            .cursor(RecordScope::Partition("even".into()), 2)
            .map(|r| r.unwrap().question_text)
            .collect();
        assert_eq!(texts, vec!["q0", "q2", "q4", "q6"]);
    }

    #[test]
    fn empty_store_yields_nothing() {
        let repo = seeded(0);
        assert!(repo.cursor(RecordScope::All, 10).next().is_none());
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let repo = seeded(2);
        assert_eq!(repo.cursor(RecordScope::All, 0).count(), 2);
    }

    #[test]
    fn writes_between_pages_do_not_disturb_scan() {
        let repo = seeded(5);
        let mut seen = 0;
        for record in repo.cursor(RecordScope::All, 2) {
            let record = record.unwrap();
            repo.update_vector(record.id, "[1.0]").unwrap();
            seen += 1;
        }
        assert_eq!(seen, 5);
    }

    #[test]
    fn store_error_yielded_once() {
        let repo = seeded(3);
        {
            let conn = repo.conn().unwrap();
            conn.execute_batch("DROP TABLE qa_records").unwrap();
        }
        let mut cursor = repo.cursor(RecordScope::All, 2);
        assert!(matches!(cursor.next(), Some(Err(StoreError::Sqlite(_)))));
        assert!(cursor.next().is_none());
    }
}
