//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`QaSettings::default()`]
//! 2. If `~/.qamatch/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::QaSettings;

/// Resolve the path to the settings file (`~/.qamatch/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".qamatch").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<QaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<QaSettings> {
    load_settings_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `env`.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<QaSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(QaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: QaSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides<F>(settings: &mut QaSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup: env };

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("DB_HOST") {
        settings.store.host = v;
    }
    if let Some(v) = env.string("DB_USER") {
        settings.store.user = v;
    }
    if let Some(v) = env.string("DB_PASSWORD") {
        settings.store.password = v;
    }
    if let Some(v) = env.string("DB_NAME") {
        settings.store.database = v;
    }
    if let Some(v) = env.string("QAMATCH_DB_PATH") {
        settings.store.path = Some(v);
    }

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("QAMATCH_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.ranged::<u16>("QAMATCH_PORT", 1, u16::MAX) {
        settings.server.port = v;
    }

    // ── Embedding ───────────────────────────────────────────────────
    if let Some(v) = env.string("QAMATCH_MODEL") {
        settings.embedding.model = v;
    }
    if let Some(v) = env.string("QAMATCH_MODEL_FILE") {
        settings.embedding.model_file = v;
    }
    if let Some(v) = env.ranged::<usize>("QAMATCH_DIMENSIONS", 1, 65_536) {
        settings.embedding.dimensions = v;
    }
    if let Some(v) = env.string("QAMATCH_MODEL_CACHE") {
        settings.embedding.cache_dir = v;
    }

    // ── Backfill ────────────────────────────────────────────────────
    if let Some(v) = env.ranged::<usize>("QAMATCH_BACKFILL_BATCH", 1, 1024) {
        settings.backfill.batch_size = v;
    }
    if let Some(v) = env.ranged::<usize>("QAMATCH_BACKFILL_PAGE", 1, 100_000) {
        settings.backfill.page_size = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("QAMATCH_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.boolean("QAMATCH_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a number within an inclusive range.
pub fn parse_ranged<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn ranged<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = self.string(name)?;
        let result = parse_ranged(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }
}
