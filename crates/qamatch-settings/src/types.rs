//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only
//! needs to name the values it overrides. Keys are camelCase on disk.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QaSettings {
    /// Record store connection settings.
    pub store: StoreSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Embedding model settings.
    pub embedding: EmbeddingSettings,
    /// Backfill job settings.
    pub backfill: BackfillSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl QaSettings {
    /// Reject values the rest of the system cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(SettingsError::InvalidValue(
                "embedding.dimensions must be positive".into(),
            ));
        }
        if self.embedding.max_batch_size == 0 {
            return Err(SettingsError::InvalidValue(
                "embedding.maxBatchSize must be positive".into(),
            ));
        }
        if self.backfill.batch_size == 0 {
            return Err(SettingsError::InvalidValue(
                "backfill.batchSize must be positive".into(),
            ));
        }
        if self.backfill.page_size == 0 {
            return Err(SettingsError::InvalidValue(
                "backfill.pageSize must be positive".into(),
            ));
        }
        if self.store.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "store.poolSize must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Record store connection parameters.
///
/// `host`, `user`, `password` and `database` mirror the environment contract
/// (`DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`). The `SQLite` backend
/// resolves `database` to a file under `~/.qamatch/` unless `path` is set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Database host.
    pub host: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Explicit database file path (takes precedence over `database`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "user".to_string(),
            password: "password".to_string(),
            database: "database".to_string(),
            path: None,
            pool_size: 8,
            busy_timeout_ms: 30_000,
        }
    }
}

impl StoreSettings {
    /// Resolve the database file path.
    ///
    /// `path` wins when set; otherwise `~/.qamatch/<database>.db`.
    pub fn resolved_path(&self) -> String {
        if let Some(ref path) = self.path {
            return expand_home(path);
        }
        expand_home(&format!("~/.qamatch/{}.db", self.database))
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("path", &self.path)
            .field("pool_size", &self.pool_size)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_ms: 30_000,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddingSettings {
    /// Hugging Face model repository.
    pub model: String,
    /// ONNX file inside the model repository.
    pub model_file: String,
    /// Output vector dimensions.
    pub dimensions: usize,
    /// Local model cache directory (may contain `~`).
    pub cache_dir: String,
    /// Maximum texts per inference call.
    pub max_batch_size: usize,
    /// Maximum tokens per text; longer inputs are truncated.
    pub max_sequence_length: usize,
    /// ONNX intra-op threads.
    pub intra_threads: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "jhgan/ko-sroberta-multitask".to_string(),
            model_file: "onnx/model.onnx".to_string(),
            dimensions: 768,
            cache_dir: "~/.qamatch/models".to_string(),
            max_batch_size: 32,
            max_sequence_length: 128,
            intra_threads: 2,
        }
    }
}

/// Backfill job settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackfillSettings {
    /// Records encoded per `encode_many` call.
    pub batch_size: usize,
    /// Records fetched per cursor page.
    pub page_size: usize,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            batch_size: 16,
            page_size: 256,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}
