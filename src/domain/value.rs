use serde::Serialize;
use std::borrow::Cow;

/// An untyped cell as produced by a file reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawValue {
    /// Build a cell from a text field, mapping blank fields to `Null`.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            RawValue::Null
        } else {
            RawValue::Text(trimmed.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Text rendering of the cell, `None` for nulls.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Null => None,
            RawValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            RawValue::Number(n) => Some(Cow::Owned(n.to_string())),
            RawValue::Bool(b) => Some(Cow::Owned(b.to_string())),
        }
    }
}

/// Rows exactly as parsed from the input file, in file order.
///
/// Every row holds one cell per header column.
#[derive(Debug, Clone, Default)]
pub struct RawRecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawRecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with nulls. Readers reject rows
    /// longer than the header before they get here.
    pub fn push_row(&mut self, mut row: Vec<RawValue>) {
        row.resize(self.columns.len(), RawValue::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&RawValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All cells of one column, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &RawValue> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_become_null() {
        assert_eq!(RawValue::from_field("   "), RawValue::Null);
        assert_eq!(RawValue::from_field(" 4.5 "), RawValue::Text("4.5".into()));
    }

    #[test]
    fn rows_are_padded_to_header_width() {
        let mut set = RawRecordSet::new(vec!["a".into(), "b".into(), "c".into()]);
        set.push_row(vec![RawValue::Number(1.0)]);
        assert_eq!(set.rows()[0].len(), 3);
        assert_eq!(set.get(0, "c"), Some(&RawValue::Null));
        assert_eq!(set.get(0, "missing"), None);
    }
}
