// Persistence sinks for cleaned datasets

pub mod flat_file;
pub mod relational;
pub mod traits;

pub use flat_file::CsvSnapshotSink;
pub use relational::SqliteSink;
pub use traits::{RunContext, Sink, SinkOutcome};

use serde::Serialize;
use tracing::{error, instrument};

use crate::domain::CleanedRecordSet;
use crate::error::{PipelineError, Result};

/// Outcome of one sink in a persist call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkReport {
    pub sink: &'static str,
    pub outcome: SinkOutcome,
}

/// Write `records` to every sink.
///
/// Every sink is attempted even after a failure, and nothing already written
/// is rolled back. Any failure turns the call into `PipelineError::Persist`.
#[instrument(skip_all, fields(rows = records.n_rows(), run_id = %ctx.run_id))]
pub fn persist(records: &CleanedRecordSet, sinks: &[&dyn Sink], ctx: &RunContext) -> Result<Vec<SinkReport>> {
    let mut reports = Vec::with_capacity(sinks.len());
    let mut failures = Vec::new();
    for sink in sinks {
        match sink.write(records, ctx) {
            Ok(outcome) => reports.push(SinkReport {
                sink: sink.name(),
                outcome,
            }),
            Err(e) => {
                error!("Sink {} failed: {}", sink.name(), e);
                failures.push(format!("{}: {}", sink.name(), e));
            }
        }
    }
    if failures.is_empty() {
        Ok(reports)
    } else {
        Err(PipelineError::Persist { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, TypedRecordSet};
    use crate::gateway::hash_bytes;
    use crate::pipeline::processing::impute;
    use std::cell::Cell;
    use uuid::Uuid;

    struct Failing;

    impl Sink for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn write(&self, _: &CleanedRecordSet, _: &RunContext) -> Result<SinkOutcome> {
            Err(PipelineError::Config("disk on fire".to_string()))
        }
    }

    struct Counting(Cell<usize>);

    impl Sink for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn write(&self, records: &CleanedRecordSet, _: &RunContext) -> Result<SinkOutcome> {
            self.0.set(self.0.get() + 1);
            Ok(SinkOutcome::Written { rows: records.n_rows() })
        }
    }

    #[test]
    fn a_failing_sink_does_not_stop_the_others() {
        let records = impute(TypedRecordSet::new(vec![Column::float("x", vec![Some(1.0)])])).unwrap();
        let ctx = RunContext {
            run_id: Uuid::new_v4(),
            digest: hash_bytes(b"x"),
            source_file: "x.csv".into(),
        };
        let counting = Counting(Cell::new(0));

        let err = persist(&records, &[&Failing, &counting], &ctx).unwrap_err();
        assert_eq!(counting.0.get(), 1);
        match err {
            PipelineError::Persist { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("failing:"));
            }
            other => panic!("expected Persist, got {other:?}"),
        }
    }
}
