//! Server configuration.

use std::time::Duration;

use qamatch_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `5000`, `0` for auto-assign).
    pub port: u16,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

impl ServerConfig {
    /// Create config from settings.
    pub fn from_settings(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            request_timeout_ms: s.request_timeout_ms,
            max_body_bytes: s.max_body_bytes,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces_on_5000() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn from_settings_copies_fields() {
        let settings = ServerSettings {
            host: "127.0.0.1".into(),
            port: 8088,
            request_timeout_ms: 1500,
            max_body_bytes: 1024,
        };
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8088");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.max_body_bytes, 1024);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.max_body_bytes, cfg.max_body_bytes);
    }
}
