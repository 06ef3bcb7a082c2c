use std::time::Duration;

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics for one pipeline run and its stages.
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_run_started() {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "runs")).increment(1);
    }

    pub fn record_run_failed(kind: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "runs_failed"), "error" => kind)
            .increment(1);
    }

    pub fn record_duplicate_file() {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "duplicate_files")).increment(1);
    }

    pub fn record_rows_ingested(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_ingested")).increment(rows as u64);
    }

    pub fn record_rows_dropped(stage: &'static str, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_dropped"), "stage" => stage)
            .increment(rows as u64);
    }

    pub fn record_columns_dropped(columns: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "columns_dropped"))
            .increment(columns as u64);
    }

    pub fn record_rows_persisted(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_persisted")).increment(rows as u64);
    }

    pub fn record_stage_duration(stage: &'static str, elapsed: Duration) {
        ::metrics::histogram!(phase_metric!(histogram, "pipeline", "stage_duration_seconds"), "stage" => stage)
            .record(elapsed.as_secs_f64());
    }
}

impl PhaseMetrics for PipelineMetrics {
    fn register_metrics() {
        for doc in Self::metrics_documentation() {
            match doc.metric_type {
                MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
                MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
            }
        }
    }

    fn phase_name() -> &'static str {
        "pipeline"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "runs"),
                metric_type: MetricType::Counter,
                help: "Pipeline runs started",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "runs_failed"),
                metric_type: MetricType::Counter,
                help: "Pipeline runs that ended in an error",
                labels: vec!["error"],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "duplicate_files"),
                metric_type: MetricType::Counter,
                help: "Input files rejected because their content was already archived",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_ingested"),
                metric_type: MetricType::Counter,
                help: "Rows parsed from input files",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_dropped"),
                metric_type: MetricType::Counter,
                help: "Rows removed by cleaning stages",
                labels: vec!["stage"],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "columns_dropped"),
                metric_type: MetricType::Counter,
                help: "Columns removed for exceeding the missingness threshold",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_persisted"),
                metric_type: MetricType::Counter,
                help: "Cleaned rows handed to the sinks",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "pipeline", "stage_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time spent in each pipeline stage",
                labels: vec!["stage"],
            },
        ]
    }
}
