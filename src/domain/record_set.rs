use chrono::NaiveDateTime;
use serde::Serialize;

use crate::constants::TIMESTAMP_OUTPUT_FORMAT;

/// Semantic type assigned to a column by the type normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Boolean,
    Float64,
    Categorical,
    Timestamp,
    /// Float split out of another column (latitude/longitude).
    DerivedFloat,
}

impl SemanticType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SemanticType::Float64 | SemanticType::DerivedFloat)
    }

    /// SQLite column affinity used by the relational sink.
    pub fn sql_type(self) -> &'static str {
        match self {
            SemanticType::Boolean => "INTEGER",
            SemanticType::Float64 | SemanticType::DerivedFloat => "REAL",
            SemanticType::Categorical | SemanticType::Timestamp => "TEXT",
        }
    }
}

/// Column storage. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<Option<bool>>),
    Float(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    values.retain(|_| flags.next().copied().unwrap_or(true));
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Boolean(v) => v[row].is_none(),
            ColumnData::Float(v) => v[row].is_none(),
            ColumnData::Categorical(v) => v[row].is_none(),
            ColumnData::Timestamp(v) => v[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    fn retain(&mut self, keep: &[bool]) {
        match self {
            ColumnData::Boolean(v) => retain_by_mask(v, keep),
            ColumnData::Float(v) => retain_by_mask(v, keep),
            ColumnData::Categorical(v) => retain_by_mask(v, keep),
            ColumnData::Timestamp(v) => retain_by_mask(v, keep),
        }
    }

    /// Text form of a cell as written to the flat-file snapshot.
    pub fn render(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Boolean(v) => v[row].map(|b| if b { "True" } else { "False" }.to_string()),
            ColumnData::Float(v) => v[row].map(|f| f.to_string()),
            ColumnData::Categorical(v) => v[row].clone(),
            ColumnData::Timestamp(v) => v[row].map(|t| t.format(TIMESTAMP_OUTPUT_FORMAT).to_string()),
        }
    }

    /// Equality key for duplicate-row detection.
    fn cell_key(&self, row: usize) -> String {
        match self {
            ColumnData::Float(v) => match v[row] {
                // 0.0 and -0.0 compare equal
                Some(f) if f == 0.0 => "f:0".to_string(),
                Some(f) => format!("f:{:016x}", f.to_bits()),
                None => "∅".to_string(),
            },
            other => other
                .render(row)
                .map(|s| format!("s:{s}"))
                .unwrap_or_else(|| "∅".to_string()),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: SemanticType,
    data: ColumnData,
}

impl Column {
    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self { name: name.into(), kind: SemanticType::Boolean, data: ColumnData::Boolean(values) }
    }

    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), kind: SemanticType::Float64, data: ColumnData::Float(values) }
    }

    pub fn derived_float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), kind: SemanticType::DerivedFloat, data: ColumnData::Float(values) }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self { name: name.into(), kind: SemanticType::Categorical, data: ColumnData::Categorical(values) }
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self { name: name.into(), kind: SemanticType::Timestamp, data: ColumnData::Timestamp(values) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SemanticType {
        self.kind
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }

    /// Float values when the column is numeric.
    pub fn floats(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.data.null_count()
    }

    /// Fraction of cells that are null; 0.0 for an empty column.
    pub fn null_fraction(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.null_count() as f64 / self.len() as f64
        }
    }
}

/// Column-oriented record set where every column has a semantic type.
///
/// All columns have the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedRecordSet {
    columns: Vec<Column>,
    rows: usize,
}

impl TypedRecordSet {
    pub fn new(columns: Vec<Column>) -> Self {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        debug_assert!(columns.iter().all(|c| c.len() == rows), "ragged columns");
        Self { columns, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    /// Keep only rows whose flag in `keep` is true; returns the number removed.
    pub fn retain_rows(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.rows);
        let kept = keep.iter().filter(|k| **k).count();
        for column in &mut self.columns {
            column.data.retain(keep);
        }
        let removed = self.rows - kept;
        self.rows = kept;
        removed
    }

    /// Key identifying a row's full contents, used to spot exact duplicates.
    pub fn row_key(&self, row: usize) -> String {
        self.columns
            .iter()
            .map(|c| c.data.cell_key(row))
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }

    pub fn null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

/// A typed record set with no missing values, ready for the sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecordSet(TypedRecordSet);

impl CleanedRecordSet {
    /// Callers must guarantee the set holds no nulls.
    pub(crate) fn from_filled(records: TypedRecordSet) -> Self {
        debug_assert_eq!(records.null_count(), 0);
        Self(records)
    }

    pub fn records(&self) -> &TypedRecordSet {
        &self.0
    }

    pub fn n_rows(&self) -> usize {
        self.0.n_rows()
    }

    pub fn columns(&self) -> &[Column] {
        self.0.columns()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.0.column(name)
    }

    /// One row rendered as text cells in column order.
    pub fn render_row(&self, row: usize) -> Vec<String> {
        self.0
            .columns()
            .iter()
            .map(|c| c.data().render(row).unwrap_or_default())
            .collect()
    }

    pub fn into_inner(self) -> TypedRecordSet {
        self.0
    }
}
