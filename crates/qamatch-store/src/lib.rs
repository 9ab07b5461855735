//! # qamatch-store
//!
//! `SQLite` persistence for question/answer records and their cached vectors.
//!
//! - [`connection`]: r2d2 pool with WAL pragmas, [`open`] for settings-driven setup
//! - [`migrations`]: versioned schema, applied idempotently
//! - [`RecordRepository`]: partition fetch, inserts, vector updates
//! - [`RecordCursor`]: keyset-paginated scan for batch jobs
//!
//! Vectors are stored as the raw text token; this crate never interprets it.

#![deny(unsafe_code)]

pub mod connection;
pub mod cursor;
pub mod errors;
pub mod migrations;
pub mod repository;
pub mod types;

pub use connection::{ConnectionConfig, ConnectionPool, open, open_in_memory};
pub use cursor::RecordCursor;
pub use errors::{Result, StoreError};
pub use repository::RecordRepository;
pub use types::{NewRecord, QaRecord, RecordId, RecordScope};
