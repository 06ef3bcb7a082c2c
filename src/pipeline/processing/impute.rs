use std::collections::HashMap;
use std::hash::Hash;
use tracing::{debug, instrument};

use crate::domain::{CleanedRecordSet, ColumnData, TypedRecordSet};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::quality_gate::quantile;

/// Median of the non-null values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);
    quantile(&present, 0.5)
}

/// Most frequent non-null value. Ties go to the value that appears first in
/// row order, so the result does not depend on hashing.
pub fn mode<T: Eq + Hash + Clone>(values: &[Option<T>]) -> Option<T> {
    let mut counts: HashMap<&T, (usize, usize)> = HashMap::new();
    for (row, value) in values.iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v).or_insert((0, row)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(v, _)| v.clone())
}

fn fill<T: Clone>(values: &mut [Option<T>], with: T) -> usize {
    let mut filled = 0;
    for slot in values.iter_mut().filter(|v| v.is_none()) {
        *slot = Some(with.clone());
        filled += 1;
    }
    filled
}

/// Fill nulls with the column median (numeric) or mode (everything else).
///
/// Fails when a column that needs filling has no values at all.
#[instrument(skip_all, fields(rows = records.n_rows(), nulls = records.null_count()))]
pub fn impute(mut records: TypedRecordSet) -> Result<CleanedRecordSet> {
    for column in records.columns_mut() {
        if column.null_count() == 0 {
            continue;
        }
        let name = column.name().to_string();
        let missing = || PipelineError::Imputation { column: name.clone() };
        let filled = match column.data_mut() {
            ColumnData::Float(v) => {
                let m = median(v).ok_or_else(missing)?;
                fill(v, m)
            }
            ColumnData::Boolean(v) => {
                let m = mode(v).ok_or_else(missing)?;
                fill(v, m)
            }
            ColumnData::Categorical(v) => {
                let m = mode(v).ok_or_else(missing)?;
                fill(v, m)
            }
            ColumnData::Timestamp(v) => {
                let m = mode(v).ok_or_else(missing)?;
                fill(v, m)
            }
        };
        debug!("Filled {} nulls in '{}'", filled, name);
    }
    Ok(CleanedRecordSet::from_filled(records))
}
