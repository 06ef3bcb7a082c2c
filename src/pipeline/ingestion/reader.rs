use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::constants::{is_supported_extension, CSV_EXTENSION, TIMESTAMP_OUTPUT_FORMAT};
use crate::domain::{RawRecordSet, RawValue};
use crate::error::{PipelineError, Result};

/// Input file families the ingestor can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

impl InputFormat {
    /// Pick a parser from the file extension.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !is_supported_extension(&ext) {
            return Err(PipelineError::UnsupportedFormat { path: path.to_path_buf() });
        }
        if ext == CSV_EXTENSION {
            Ok(InputFormat::Csv)
        } else {
            Ok(InputFormat::Spreadsheet)
        }
    }
}

pub fn read_records(path: &Path, format: InputFormat) -> Result<RawRecordSet> {
    let records = match format {
        InputFormat::Csv => read_csv(path)?,
        InputFormat::Spreadsheet => read_spreadsheet(path)?,
    };
    debug!(
        "Parsed {} rows x {} columns from {}",
        records.len(),
        records.columns().len(),
        path.display()
    );
    Ok(records)
}

fn read_csv(path: &Path) -> Result<RawRecordSet> {
    let parse_err = |e: csv::Error| PipelineError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(parse_err)?;
    let headers = reader.headers().map_err(parse_err)?.clone();
    let mut records = RawRecordSet::new(dedupe_headers(
        headers.iter().map(|h| h.trim_start_matches('\u{feff}').trim().to_string()),
    ));
    for row in reader.records() {
        let row = row.map_err(parse_err)?;
        // Short rows are padded; extra cells would be lost
        if row.len() > headers.len() {
            let line = row.position().map_or(0, |p| p.line());
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                message: format!(
                    "line {line}: expected {} fields, saw {}",
                    headers.len(),
                    row.len()
                ),
            });
        }
        records.push_row(row.iter().map(RawValue::from_field).collect());
    }
    Ok(records)
}

fn read_spreadsheet(path: &Path) -> Result<RawRecordSet> {
    let parse_err = |message: String| PipelineError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| parse_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_err("workbook has no sheets".to_string()))?
        .map_err(|e| parse_err(e.to_string()))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| parse_err("first sheet is empty".to_string()))?;
    let mut records = RawRecordSet::new(dedupe_headers(
        header.iter().map(|cell| cell.to_string().trim().to_string()),
    ));
    for row in rows {
        records.push_row(row.iter().map(cell_value).collect());
    }
    Ok(records)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Null,
        Data::String(s) => RawValue::from_field(s),
        Data::Float(f) => RawValue::Number(*f),
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => RawValue::Text(ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string()),
            None => RawValue::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::from_field(s),
    }
}

/// Repeated header names get a `.N` suffix so they surface as extra columns
/// during schema validation instead of silently shadowing each other.
fn dedupe_headers<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let n = counts.entry(name.clone()).or_insert(0);
            let out = if *n == 0 { name } else { format!("{name}.{n}") };
            *n += 1;
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(InputFormat::detect(Path::new("a.CSV")).unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::detect(Path::new("a.xlsx")).unwrap(), InputFormat::Spreadsheet);
        assert!(matches!(
            InputFormat::detect(Path::new("a.json")),
            Err(PipelineError::UnsupportedFormat { .. })
        ));
        assert!(InputFormat::detect(Path::new("noext")).is_err());
    }

    #[test]
    fn csv_blank_fields_are_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "a,b\n1, \n,x\n").unwrap();
        let set = read_records(&path, InputFormat::Csv).unwrap();
        assert_eq!(set.columns(), &["a", "b"]);
        assert_eq!(set.rows()[0], vec![RawValue::Text("1".into()), RawValue::Null]);
        assert_eq!(set.rows()[1], vec![RawValue::Null, RawValue::Text("x".into())]);
    }

    #[test]
    fn quoted_coordinates_survive_csv_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "id,User Coordinates\n1,\"12.5,-3.25\"\n").unwrap();
        let set = read_records(&path, InputFormat::Csv).unwrap();
        assert_eq!(set.get(0, "User Coordinates"), Some(&RawValue::Text("12.5,-3.25".into())));
    }

    #[test]
    fn csv_rows_longer_than_the_header_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "a,b\n1,2\n3,4,999\n").unwrap();
        match read_records(&path, InputFormat::Csv) {
            Err(PipelineError::Parse { message, .. }) => assert!(message.contains("line 3"), "{message}"),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn csv_short_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "a,b\n1\n").unwrap();
        let set = read_records(&path, InputFormat::Csv).unwrap();
        assert_eq!(set.rows()[0], vec![RawValue::Text("1".into()), RawValue::Null]);
    }

    #[test]
    fn xlsx_sheet_is_read_with_dates_and_blanks() {
        use crate::pipeline::processing::normalize::coerce;
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("powerbox.xlsx");
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Timestamp").unwrap();
        sheet.write_string(0, 1, "Voltage (V)").unwrap();
        sheet.write_string(0, 2, "Customer Profile").unwrap();
        let first = ExcelDateTime::from_ymd(2024, 1, 5).unwrap().and_hms(8, 30, 0).unwrap();
        let second = ExcelDateTime::from_ymd(2024, 1, 5).unwrap().and_hms(9, 0, 0).unwrap();
        sheet.write_datetime_with_format(1, 0, &first, &date_format).unwrap();
        sheet.write_number(1, 1, 230.5).unwrap();
        sheet.write_string(1, 2, "home").unwrap();
        sheet.write_datetime_with_format(2, 0, &second, &date_format).unwrap();
        sheet.write_string(2, 2, "shop").unwrap();
        workbook.save(&path).unwrap();

        let set = read_records(&path, InputFormat::detect(&path).unwrap()).unwrap();
        assert_eq!(set.columns(), &["Timestamp", "Voltage (V)", "Customer Profile"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0, "Timestamp"), Some(&RawValue::Text("2024-01-05 08:30:00".into())));
        assert_eq!(set.get(0, "Voltage (V)"), Some(&RawValue::Number(230.5)));
        assert_eq!(set.get(1, "Voltage (V)"), Some(&RawValue::Null));
        assert_eq!(set.get(1, "Customer Profile"), Some(&RawValue::Text("shop".into())));

        let ts = coerce::to_timestamp(set.get(1, "Timestamp").unwrap()).unwrap();
        assert_eq!(ts.to_string(), "2024-01-05 09:00:00");
    }

    #[test]
    fn repeated_headers_are_suffixed() {
        assert_eq!(
            dedupe_headers(["a".to_string(), "b".to_string(), "a".to_string()]),
            vec!["a", "b", "a.1"]
        );
    }

    #[test]
    fn unreadable_spreadsheet_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        fs::write(&path, "not a zip").unwrap();
        assert!(matches!(
            read_records(&path, InputFormat::Spreadsheet),
            Err(PipelineError::Parse { .. })
        ));
    }
}
