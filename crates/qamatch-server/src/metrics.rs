//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Match requests total (counter, labels: outcome).
pub const MATCH_REQUESTS_TOTAL: &str = "match_requests_total";
/// Match request duration seconds (histogram).
pub const MATCH_DURATION_SECONDS: &str = "match_duration_seconds";
/// Backfill runs total (counter).
pub const BACKFILL_RUNS_TOTAL: &str = "backfill_runs_total";
/// Records written by backfill (counter).
pub const BACKFILL_RECORDS_UPDATED_TOTAL: &str = "backfill_records_updated_total";
/// Records backfill failed to encode or write (counter).
pub const BACKFILL_RECORDS_FAILED_TOTAL: &str = "backfill_records_failed_total";
/// Error responses total (counter, labels: code).
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            ::metrics::counter!(MATCH_REQUESTS_TOTAL, "outcome" => "matched").increment(2);
        });
        let output = render(&handle);
        assert!(output.contains("match_requests_total"), "{output}");
        assert!(output.contains("outcome=\"matched\""), "{output}");
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            MATCH_REQUESTS_TOTAL,
            MATCH_DURATION_SECONDS,
            BACKFILL_RUNS_TOTAL,
            BACKFILL_RECORDS_UPDATED_TOTAL,
            BACKFILL_RECORDS_FAILED_TOTAL,
            HTTP_ERRORS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
