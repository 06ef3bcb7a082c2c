use serde::Serialize;

use crate::domain::RawRecordSet;
use crate::pipeline::processing::impute::median;
use crate::pipeline::processing::normalize::coerce;

/// Summary statistics for one column of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub count: usize,
    pub nulls: usize,
    pub numeric: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Describe every column. A column gets numeric statistics only when all of
/// its non-null cells parse as numbers.
pub fn profile(records: &RawRecordSet) -> Vec<ColumnProfile> {
    records
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells: Vec<_> = records.column_values(idx).collect();
            let nulls = cells.iter().filter(|c| c.is_null()).count();
            let parsed: Option<Vec<Option<f64>>> = cells
                .iter()
                .map(|c| coerce::to_float(c).ok())
                .collect();
            ColumnProfile {
                name: name.clone(),
                count: cells.len() - nulls,
                nulls,
                numeric: parsed.and_then(|values| summarize(&values)),
            }
        })
        .collect()
}

fn summarize(values: &[Option<f64>]) -> Option<NumericSummary> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    Some(NumericSummary {
        min,
        max,
        mean,
        median: median(values)?,
    })
}
