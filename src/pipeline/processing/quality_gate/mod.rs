//! Quality filter: column missingness, IQR outliers, and consistency checks.
//!
//! Each pass works on the output of the previous one, so statistics always
//! describe the rows still present.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::constants::{DEFAULT_IQR_MULTIPLIER, DEFAULT_MISSINGNESS_THRESHOLD, NON_NEGATIVE_COLUMNS};
use crate::domain::TypedRecordSet;

/// How per-column IQR bounds combine across columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Column by column: each column's bounds are computed on the rows that
    /// survived the previous columns, so column order matters.
    #[default]
    Sequential,
    /// All bounds are computed on the same input rows; a row is kept only if
    /// it is inside every column's bounds.
    Independent,
}

/// Configuration for the quality filter
#[derive(Debug, Clone)]
pub struct QualityFilterConfig {
    /// Columns with a null fraction strictly above this are dropped
    pub missingness_threshold: f64,
    /// Bounds are `[Q1 - k*IQR, Q3 + k*IQR]`
    pub iqr_multiplier: f64,
    pub outlier_policy: OutlierPolicy,
    /// Measurements where a negative value marks the whole row invalid
    pub non_negative_columns: Vec<String>,
}

impl Default for QualityFilterConfig {
    fn default() -> Self {
        Self {
            missingness_threshold: DEFAULT_MISSINGNESS_THRESHOLD,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            outlier_policy: OutlierPolicy::default(),
            non_negative_columns: NON_NEGATIVE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Rows removed by one column's IQR bounds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRemoval {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    /// Rows outside the bounds. Under the independent policy a row can be
    /// counted against several columns.
    pub rows: usize,
}

/// What the filter removed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub dropped_columns: Vec<String>,
    pub outliers: Vec<OutlierRemoval>,
    pub outlier_rows: usize,
    pub duplicate_rows: usize,
    pub negative_rows: usize,
}

impl QualityReport {
    pub fn rows_removed(&self) -> usize {
        self.outlier_rows + self.duplicate_rows + self.negative_rows
    }
}

/// Linear-interpolation quantile of an ascending slice. `q` is in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// IQR bounds over the non-null finite values, `None` when there are none.
pub fn iqr_bounds(values: &[Option<f64>], multiplier: f64) -> Option<(f64, f64)> {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    present.sort_by(f64::total_cmp);
    let q1 = quantile(&present, 0.25)?;
    let q3 = quantile(&present, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - multiplier * iqr, q3 + multiplier * iqr))
}

/// Nulls never fall outside bounds; they are left for imputation.
fn within(value: Option<f64>, (lower, upper): (f64, f64)) -> bool {
    value.map_or(true, |v| v >= lower && v <= upper)
}

/// Three-pass dataset cleaner
pub struct QualityFilter {
    config: QualityFilterConfig,
}

impl QualityFilter {
    pub fn new(config: QualityFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityFilterConfig {
        &self.config
    }

    /// Run missingness, outlier and consistency passes in that order.
    #[instrument(skip_all, fields(rows = records.n_rows(), columns = records.n_columns()))]
    pub fn apply(&self, mut records: TypedRecordSet) -> (TypedRecordSet, QualityReport) {
        let mut report = QualityReport {
            dropped_columns: self.drop_high_missingness(&mut records),
            ..QualityReport::default()
        };

        let before = records.n_rows();
        report.outliers = self.remove_outliers(&mut records);
        report.outlier_rows = before - records.n_rows();

        let (duplicates, negatives) = self.check_consistency(&mut records);
        report.duplicate_rows = duplicates;
        report.negative_rows = negatives;

        info!(
            "Quality filter kept {} rows x {} columns ({} outliers, {} duplicates, {} negative)",
            records.n_rows(),
            records.n_columns(),
            report.outlier_rows,
            report.duplicate_rows,
            report.negative_rows
        );
        (records, report)
    }

    /// Drop columns whose null fraction exceeds the threshold.
    pub fn drop_high_missingness(&self, records: &mut TypedRecordSet) -> Vec<String> {
        let doomed: Vec<String> = records
            .columns()
            .iter()
            .filter(|c| c.null_fraction() > self.config.missingness_threshold)
            .map(|c| c.name().to_string())
            .collect();
        for name in &doomed {
            records.drop_column(name);
            info!("Dropped column '{}' for exceeding missingness threshold", name);
        }
        doomed
    }

    /// Remove rows outside the IQR bounds of any numeric column.
    pub fn remove_outliers(&self, records: &mut TypedRecordSet) -> Vec<OutlierRemoval> {
        match self.config.outlier_policy {
            OutlierPolicy::Sequential => self.remove_outliers_sequential(records),
            OutlierPolicy::Independent => self.remove_outliers_independent(records),
        }
    }

    fn numeric_columns(records: &TypedRecordSet) -> Vec<String> {
        records
            .columns()
            .iter()
            .filter(|c| c.kind().is_numeric())
            .map(|c| c.name().to_string())
            .collect()
    }

    fn remove_outliers_sequential(&self, records: &mut TypedRecordSet) -> Vec<OutlierRemoval> {
        let mut removals = Vec::new();
        for name in Self::numeric_columns(records) {
            let Some(values) = records.column(&name).and_then(|c| c.floats()) else {
                continue;
            };
            let Some(bounds) = iqr_bounds(values, self.config.iqr_multiplier) else {
                continue;
            };
            let keep: Vec<bool> = values.iter().map(|v| within(*v, bounds)).collect();
            let removed = records.retain_rows(&keep);
            debug!("Outlier bounds for '{}': [{}, {}], removed {}", name, bounds.0, bounds.1, removed);
            removals.push(OutlierRemoval {
                column: name,
                lower: bounds.0,
                upper: bounds.1,
                rows: removed,
            });
        }
        removals
    }

    fn remove_outliers_independent(&self, records: &mut TypedRecordSet) -> Vec<OutlierRemoval> {
        let mut keep = vec![true; records.n_rows()];
        let mut removals = Vec::new();
        for name in Self::numeric_columns(records) {
            let Some(values) = records.column(&name).and_then(|c| c.floats()) else {
                continue;
            };
            let Some(bounds) = iqr_bounds(values, self.config.iqr_multiplier) else {
                continue;
            };
            let mut flagged = 0;
            for (row, value) in values.iter().enumerate() {
                if !within(*value, bounds) {
                    keep[row] = false;
                    flagged += 1;
                }
            }
            removals.push(OutlierRemoval {
                column: name,
                lower: bounds.0,
                upper: bounds.1,
                rows: flagged,
            });
        }
        records.retain_rows(&keep);
        removals
    }

    /// Drop exact duplicate rows (first occurrence wins), then rows with a
    /// negative value in any non-negative measurement column.
    pub fn check_consistency(&self, records: &mut TypedRecordSet) -> (usize, usize) {
        let mut seen = HashSet::with_capacity(records.n_rows());
        let keep: Vec<bool> = (0..records.n_rows()).map(|row| seen.insert(records.row_key(row))).collect();
        let duplicates = records.retain_rows(&keep);

        let mut keep = vec![true; records.n_rows()];
        for name in &self.config.non_negative_columns {
            let Some(values) = records.column(name).and_then(|c| c.floats()) else {
                continue;
            };
            for (row, value) in values.iter().enumerate() {
                if matches!(value, Some(v) if *v < 0.0) {
                    keep[row] = false;
                }
            }
        }
        let negatives = records.retain_rows(&keep);
        (duplicates, negatives)
    }
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(QualityFilterConfig::default())
    }
}
