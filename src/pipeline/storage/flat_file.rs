use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::traits::{RunContext, Sink, SinkOutcome};
use crate::domain::CleanedRecordSet;
use crate::error::{PipelineError, Result};

/// Overwrites a CSV snapshot with the full cleaned dataset.
///
/// The snapshot is written to a sibling temp file and renamed into place,
/// so readers never observe a half-written file.
pub struct CsvSnapshotSink {
    path: PathBuf,
}

impl CsvSnapshotSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self, ctx: &RunContext) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.csv".to_string());
        self.path.with_file_name(format!(".{name}.{}.tmp", ctx.run_id.simple()))
    }

    fn write_to(path: &Path, records: &CleanedRecordSet) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(records.columns().iter().map(|c| c.name()))?;
        for row in 0..records.n_rows() {
            writer.write_record(records.render_row(row))?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("flushing {}", path.display()), e))?;
        Ok(())
    }
}

impl Sink for CsvSnapshotSink {
    fn name(&self) -> &'static str {
        "csv_snapshot"
    }

    fn write(&self, records: &CleanedRecordSet, ctx: &RunContext) -> Result<SinkOutcome> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }
        let tmp = self.temp_path(ctx);
        if let Err(e) = Self::write_to(&tmp, records) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PipelineError::io(format!("replacing {}", self.path.display()), e)
        })?;
        info!("Cleaned data CSV saved at {}", self.path.display());
        Ok(SinkOutcome::Written {
            rows: records.n_rows(),
        })
    }
}
