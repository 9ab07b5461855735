//! Tracing subscriber setup.

use qamatch_settings::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_subscriber(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_does_not_panic() {
        let settings = LoggingSettings {
            level: "warn".into(),
            json: true,
        };
        init_subscriber(&settings);
        init_subscriber(&settings);
        tracing::warn!("still logging");
    }
}
