//! Record types stored in the `qa_records` table.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Store-assigned record identifier.
pub type RecordId = i64;

/// One question/answer unit.
///
/// `vector` holds the raw serialized token exactly as stored; validation
/// belongs to the embeddings layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// Stable identifier.
    pub id: RecordId,
    /// Caller-supplied scope.
    pub partition_key: String,
    /// Opaque key passed through to match results.
    pub secondary_key: String,
    /// Owner identifier, passed through unchanged.
    pub owner_id: i64,
    /// Text the vector is derived from.
    pub question_text: String,
    /// Payload returned on match.
    pub answer_text: String,
    /// Serialized vector token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<String>,
}

impl QaRecord {
    pub(crate) const COLUMNS: &'static str =
        "id, partition_key, secondary_key, owner_id, question_text, answer_text, vector";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            partition_key: row.get(1)?,
            secondary_key: row.get(2)?,
            owner_id: row.get(3)?,
            question_text: row.get(4)?,
            answer_text: row.get(5)?,
            vector: row.get(6)?,
        })
    }
}

/// A record to insert. The store assigns the id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Caller-supplied scope.
    pub partition_key: String,
    /// Opaque key; accepts a JSON string or integer.
    #[serde(default, deserialize_with = "string_or_number")]
    pub secondary_key: String,
    /// Owner identifier.
    #[serde(default)]
    pub owner_id: i64,
    /// Question text.
    pub question_text: String,
    /// Answer text.
    pub answer_text: String,
    /// Pre-computed vector token, if the producer already has one.
    #[serde(default)]
    pub vector: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Which records a scan covers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RecordScope {
    /// Every record in the store.
    #[default]
    All,
    /// Records sharing one partition key.
    Partition(String),
}

impl RecordScope {
    /// Scope from an optional partition key (`None` means all).
    pub fn from_partition(key: Option<String>) -> Self {
        key.map_or(Self::All, Self::Partition)
    }

    /// The partition key, if scoped.
    pub fn partition_key(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Partition(key) => Some(key),
        }
    }
}
