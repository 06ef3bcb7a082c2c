//! Type normalization: raw cells to typed columns.

pub mod coerce;
pub mod registry;

pub use registry::{ColumnRule, TypeRuleRegistry};

use tracing::{info, instrument, warn};

use crate::domain::{Column, RawRecordSet, RawValue, TypedRecordSet};
use crate::error::{PipelineError, Result};

/// Output of [`normalize`].
#[derive(Debug)]
pub struct NormalizedRecords {
    pub records: TypedRecordSet,
    /// Rows removed because a timestamp cell could not be parsed.
    pub dropped_timestamp_rows: usize,
}

/// Convert every raw column according to its rule, in column order.
///
/// The first cell that cannot be converted aborts the whole batch, except for
/// timestamps: rows with an unparseable timestamp are dropped instead.
/// Coordinate columns are replaced by their two derived columns, appended
/// after the others.
#[instrument(skip_all, fields(rows = raw.len(), columns = raw.columns().len()))]
pub fn normalize(raw: RawRecordSet, rules: &TypeRuleRegistry) -> Result<NormalizedRecords> {
    let mut columns = Vec::with_capacity(raw.columns().len() + 1);
    let mut derived = Vec::new();
    let mut bad_timestamp = vec![false; raw.len()];

    for (idx, name) in raw.columns().iter().enumerate() {
        let values = raw.column_values(idx);
        match rules.rule_for(name) {
            ColumnRule::Boolean => columns.push(Column::boolean(name, convert(name, values, coerce::to_bool)?)),
            ColumnRule::Float => columns.push(Column::float(name, convert(name, values, coerce::to_float)?)),
            ColumnRule::Percentage => {
                columns.push(Column::float(name, convert(name, values, coerce::to_fraction)?))
            }
            ColumnRule::Categorical => {
                columns.push(Column::categorical(name, convert(name, values, coerce::to_category)?))
            }
            ColumnRule::Timestamp => {
                let parsed: Vec<_> = values.map(coerce::to_timestamp).collect();
                for (row, ts) in parsed.iter().enumerate() {
                    if ts.is_none() {
                        bad_timestamp[row] = true;
                    }
                }
                columns.push(Column::timestamp(name, parsed));
            }
            ColumnRule::Coordinates { latitude, longitude } => {
                let pairs = convert(name, values, coerce::to_coordinates)?;
                let (lat, lon): (Vec<_>, Vec<_>) = pairs
                    .into_iter()
                    .map(|p| (p.and_then(|(lat, _)| lat), p.and_then(|(_, lon)| lon)))
                    .unzip();
                derived.push(Column::derived_float(latitude.as_str(), lat));
                derived.push(Column::derived_float(longitude.as_str(), lon));
            }
        }
    }
    columns.extend(derived);

    let mut records = TypedRecordSet::new(columns);
    let keep: Vec<bool> = bad_timestamp.iter().map(|bad| !bad).collect();
    let dropped_timestamp_rows = records.retain_rows(&keep);
    if dropped_timestamp_rows > 0 {
        warn!("Dropped {} rows with unparseable timestamps", dropped_timestamp_rows);
    }
    info!(
        "Data types corrected: {} rows x {} columns",
        records.n_rows(),
        records.n_columns()
    );

    Ok(NormalizedRecords {
        records,
        dropped_timestamp_rows,
    })
}

fn convert<'a, T, I, F>(column: &str, values: I, coerce: F) -> Result<Vec<Option<T>>>
where
    I: Iterator<Item = &'a RawValue>,
    F: Fn(&RawValue) -> std::result::Result<Option<T>, String>,
{
    values
        .enumerate()
        .map(|(row, value)| {
            coerce(value).map_err(|cause| PipelineError::TypeCoercion {
                column: column.to_string(),
                cause: format!("row {}: {cause}", row + 1),
            })
        })
        .collect()
}
