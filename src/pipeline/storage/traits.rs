use serde::Serialize;
use uuid::Uuid;

use crate::domain::CleanedRecordSet;
use crate::error::Result;
use crate::gateway::FileDigest;

/// Identifies the run whose rows are being written.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub digest: FileDigest,
    /// File name of the renamed input.
    pub source_file: String,
}

/// What a sink did with the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkOutcome {
    Written { rows: usize },
    Skipped { reason: String },
}

/// A persistence target for cleaned datasets
pub trait Sink {
    /// Short label used in logs and reports
    fn name(&self) -> &'static str;

    fn write(&self, records: &CleanedRecordSet, ctx: &RunContext) -> Result<SinkOutcome>;
}
