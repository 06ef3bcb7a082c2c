use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Ordered set of column names a raw file must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting blank or repeated names.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for column in columns {
            let name: String = column.into().trim().to_string();
            if name.is_empty() {
                return Err(PipelineError::SchemaDefinition("blank column name".to_string()));
            }
            if !seen.insert(name.clone()) {
                return Err(PipelineError::SchemaDefinition(format!("duplicate column '{name}'")));
            }
            names.push(name);
        }
        Ok(Self { columns: names })
    }

    /// Load the expected columns from the header row of a reference CSV.
    /// Data rows in the reference file are ignored.
    pub fn from_csv_header(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PipelineError::SchemaDefinition(format!("{}: {e}", path.display())))?;
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(PipelineError::SchemaDefinition(format!(
                "{} has no header row",
                path.display()
            )));
        }
        Self::new(headers.iter().map(|h| h.trim_start_matches('\u{feff}')))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Schema::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaDefinition(_)));
    }

    #[test]
    fn header_row_defines_the_schema() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\u{feff}Timestamp,System ON,Voltage (V)").unwrap();
        writeln!(file, "01/01/2024 00:00,True,230").unwrap();
        let schema = Schema::from_csv_header(file.path()).unwrap();
        assert_eq!(schema.columns(), &["Timestamp", "System ON", "Voltage (V)"]);
        assert!(schema.contains("System ON"));
    }
}
