//! # qamatch-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** - [`QaSettings::default()`]
//! 2. **User file** - `~/.qamatch/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** - `DB_*` and `QAMATCH_*` overrides
//!
//! Settings are read once at startup and passed by value to the crates
//! that need them; there is no global cache.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with_env, settings_path,
};
pub use types::*;
