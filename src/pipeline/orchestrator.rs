//! Pipeline orchestrator: runs every stage for one input file, fail-fast.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::domain::Schema;
use crate::error::Result;
use crate::gateway::FileDigest;
use crate::metrics::PipelineMetrics;
use crate::pipeline::archive::archive;
use crate::pipeline::ingestion::ingest_on;
use crate::pipeline::processing::{impute, normalize, validate, QualityFilter, QualityReport, TypeRuleRegistry};
use crate::pipeline::storage::{persist, CsvSnapshotSink, RunContext, SinkReport, SqliteSink};

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub source: PathBuf,
    pub renamed_path: PathBuf,
    pub digest: FileDigest,
    pub rows_ingested: usize,
    pub dropped_timestamp_rows: usize,
    pub quality: QualityReport,
    pub rows_cleaned: usize,
    pub columns: Vec<String>,
    pub sinks: Vec<SinkReport>,
    /// `None` when the archive move failed; the run still succeeded.
    pub archived_path: Option<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    schema: Schema,
    rules: TypeRuleRegistry,
    filter: QualityFilter,
}

impl Pipeline {
    /// Build a pipeline, loading the schema named by the config.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let schema = Schema::from_csv_header(&config.schema_file)?;
        Ok(Self::with_schema(config, schema))
    }

    pub fn with_schema(config: PipelineConfig, schema: Schema) -> Self {
        let filter = QualityFilter::new(config.quality_filter_config());
        Self {
            config,
            schema,
            rules: TypeRuleRegistry::powerbox(),
            filter,
        }
    }

    /// Replace the column rule registry.
    pub fn with_rules(mut self, rules: TypeRuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn run(&self, input: &Path) -> Result<PipelineReport> {
        self.run_on(input, Local::now().date_naive())
    }

    /// Run with `date` used for the dated rename.
    pub fn run_on(&self, input: &Path, date: NaiveDate) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", input = %input.display(), run_id = %run_id);
        let _enter = span.enter();

        PipelineMetrics::record_run_started();
        let started = Instant::now();
        match self.execute(input, date, run_id) {
            Ok(report) => {
                info!(
                    "Pipeline finished in {:.2?}: {} of {} rows cleaned",
                    started.elapsed(),
                    report.rows_cleaned,
                    report.rows_ingested
                );
                Ok(report)
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                PipelineMetrics::record_run_failed(e.kind());
                Err(e)
            }
        }
    }

    fn execute(&self, input: &Path, date: NaiveDate, run_id: Uuid) -> Result<PipelineReport> {
        let archive_dir = &self.config.archive_dir;

        let ingested = timed("ingest", || ingest_on(input, archive_dir, date))?;
        let rows_ingested = ingested.records.len();

        timed("validate", || validate(&ingested.records, &self.schema))?;

        let normalized = timed("normalize", || normalize(ingested.records, &self.rules))?;
        PipelineMetrics::record_rows_dropped("normalize", normalized.dropped_timestamp_rows);

        let (filtered, quality) = timed("quality", || Ok(self.filter.apply(normalized.records)))?;
        PipelineMetrics::record_columns_dropped(quality.dropped_columns.len());
        PipelineMetrics::record_rows_dropped("outliers", quality.outlier_rows);
        PipelineMetrics::record_rows_dropped("duplicates", quality.duplicate_rows);
        PipelineMetrics::record_rows_dropped("negative", quality.negative_rows);

        let cleaned = timed("impute", || impute(filtered))?;

        let ctx = RunContext {
            run_id,
            digest: ingested.digest.clone(),
            source_file: ingested
                .renamed_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let relational = SqliteSink::new(&self.config.relational.store, &self.config.relational.table);
        let snapshot = CsvSnapshotSink::new(&self.config.flat_file.path);
        let sinks = timed("persist", || persist(&cleaned, &[&relational, &snapshot], &ctx))?;
        PipelineMetrics::record_rows_persisted(cleaned.n_rows());

        let archived_path = timed("archive", || Ok(archive(&ingested.renamed_path, archive_dir, &ingested.digest)))?;
        if archived_path.is_none() {
            warn!("Run succeeded but {} was not archived", ingested.renamed_path.display());
        }

        Ok(PipelineReport {
            run_id,
            source: input.to_path_buf(),
            renamed_path: ingested.renamed_path,
            digest: ingested.digest,
            rows_ingested,
            dropped_timestamp_rows: normalized.dropped_timestamp_rows,
            quality,
            rows_cleaned: cleaned.n_rows(),
            columns: cleaned.columns().iter().map(|c| c.name().to_string()).collect(),
            sinks,
            archived_path,
        })
    }
}

fn timed<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let out = f();
    PipelineMetrics::record_stage_duration(stage, started.elapsed());
    out
}
