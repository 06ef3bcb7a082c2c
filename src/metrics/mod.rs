//! Pipeline metrics
//!
//! Stages record through the `metrics` facade. A batch run installs a
//! Prometheus recorder without an HTTP listener and, when asked, writes the
//! rendered exposition to a file for a textfile collector to pick up.

pub mod pipeline;

pub use pipeline::PipelineMetrics;

use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder and register all metrics.
///
/// Idempotent. Without this call every metric macro is a no-op.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Prometheus handle already stored");
                }
                PipelineMetrics::register_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

/// Current metrics in Prometheus text format, if a recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Write the rendered metrics to `path`, replacing any previous snapshot.
pub fn write_textfile(path: &Path) -> Result<()> {
    let Some(body) = render() else {
        warn!("Metrics recorder not installed; nothing written to {}", path.display());
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
    }
    std::fs::write(path, body)
        .map_err(|e| PipelineError::io(format!("writing {}", path.display()), e))?;
    info!("Metrics written to {}", path.display());
    Ok(())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase so they appear even at zero.
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Documentation for every metric in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build metric names as `powerbox_{phase}_{name}` with `_total` on counters.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("powerbox_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("powerbox_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_metrics_reach_the_exposition() {
        init_metrics();
        PipelineMetrics::record_run_started();
        PipelineMetrics::record_rows_ingested(10);
        PipelineMetrics::record_stage_duration("ingest", std::time::Duration::from_millis(5));

        let body = render().unwrap_or_default();
        assert!(body.contains("powerbox_pipeline_runs_total"), "{body}");
        assert!(body.contains("powerbox_pipeline_rows_ingested_total"), "{body}");
        assert!(body.contains("powerbox_pipeline_stage_duration_seconds"), "{body}");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("textfile/powerbox.prom");
        write_textfile(&out).unwrap();
        assert!(std::fs::read_to_string(out).unwrap().contains("powerbox_pipeline_runs_total"));
    }
}
