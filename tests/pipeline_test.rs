use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use powerbox_pipeline::config::PipelineConfig;
use powerbox_pipeline::domain::Schema;
use powerbox_pipeline::pipeline::storage::{SinkOutcome, SqliteSink};
use powerbox_pipeline::pipeline::Pipeline;
use powerbox_pipeline::PipelineError;

const HEADER: &str = "Timestamp,System ON,Power Consumption (kW),Voltage (V),Customer Profile";

// Rows 9 and 10 repeat rows 2 and 3, row 4 has a negative consumption and
// row 5 is missing its voltage.
const ROWS: &[&str] = &[
    "01/01/2024 00:00,True,2,230,home",
    "01/01/2024 01:00,True,10,231,home",
    "01/01/2024 02:00,False,18,229,shop",
    "01/01/2024 03:00,True,-5,230,home",
    "01/01/2024 04:00,False,6,,shop",
    "01/01/2024 05:00,True,14,232,home",
    "01/01/2024 06:00,True,8,228,farm",
    "01/01/2024 07:00,False,4,231,home",
    "01/01/2024 01:00,True,10,231,home",
    "01/01/2024 02:00,False,18,229,shop",
];

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("incoming")).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.archive_dir = self.path("archive");
        config.log_dir = self.path("logs");
        config.relational.store = self.path("clean/solar_system.db");
        config.flat_file.path = self.path("clean/cleaned_solar_data.csv");
        config
    }

    fn pipeline(&self) -> Pipeline {
        let schema = Schema::new(HEADER.split(',')).unwrap();
        Pipeline::with_schema(self.config(), schema)
    }

    fn drop_file(&self, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let path = self.path("incoming").join(name);
        let mut body = String::from(header);
        body.push('\n');
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(&path, body).unwrap();
        path
    }

    fn store(&self) -> SqliteSink {
        let config = self.config();
        SqliteSink::new(config.relational.store, config.relational.table)
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn snapshot_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn ten_row_export_yields_seven_clean_rows_in_both_sinks() {
    let ws = Workspace::new();
    let input = ws.drop_file("powerbox.csv", HEADER, ROWS);

    let report = ws.pipeline().run_on(&input, day()).unwrap();

    assert_eq!(report.rows_ingested, 10);
    assert_eq!(report.quality.duplicate_rows, 2);
    assert_eq!(report.quality.negative_rows, 1);
    assert_eq!(report.quality.outlier_rows, 0);
    assert_eq!(report.rows_cleaned, 7);
    assert_eq!(report.renamed_path, ws.path("incoming/powerbox_20240102.csv"));
    assert_eq!(report.archived_path, Some(ws.path("archive/powerbox_20240102.csv")));
    assert!(report
        .sinks
        .iter()
        .all(|s| s.outcome == SinkOutcome::Written { rows: 7 }));

    let snapshot = snapshot_rows(&ws.config().flat_file.path);
    assert_eq!(snapshot.len(), 7);
    assert!(snapshot.iter().flatten().all(|cell| !cell.is_empty()));
    // Missing voltage takes the median of the surviving rows
    assert_eq!(
        snapshot[3],
        vec!["2024-01-01 04:00:00", "False", "6", "230.5", "shop"]
    );

    let conn = rusqlite::Connection::open(&ws.config().relational.store).unwrap();
    let mut stmt = conn
        .prepare(r#"SELECT "Timestamp", "Power Consumption (kW)", "Voltage (V)" FROM cleaned_solar_data ORDER BY rowid"#)
        .unwrap();
    let stored: Vec<(String, f64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    let from_snapshot: Vec<(String, f64, f64)> = snapshot
        .iter()
        .map(|r| (r[0].clone(), r[2].parse().unwrap(), r[3].parse().unwrap()))
        .collect();
    assert_eq!(stored, from_snapshot);
}

#[test]
fn same_content_under_a_new_name_is_rejected() {
    let ws = Workspace::new();
    let first = ws.drop_file("powerbox.csv", HEADER, ROWS);
    ws.pipeline().run_on(&first, day()).unwrap();

    let second = ws.drop_file("resend.csv", HEADER, ROWS);
    let err = ws.pipeline().run_on(&second, day()).unwrap_err();
    match err {
        PipelineError::DuplicateFile { archived, .. } => {
            assert_eq!(archived, ws.path("archive/powerbox_20240102.csv"));
        }
        other => panic!("expected DuplicateFile, got {other:?}"),
    }
    assert_eq!(ws.store().row_count().unwrap(), 7);
}

#[test]
fn relational_sink_appends_across_runs() {
    let ws = Workspace::new();
    let first = ws.drop_file("monday.csv", HEADER, ROWS);
    ws.pipeline().run_on(&first, day()).unwrap();

    let second = ws.drop_file("tuesday.csv", HEADER, &ROWS[..3]);
    let report = ws.pipeline().run_on(&second, day()).unwrap();

    assert_eq!(report.rows_cleaned, 3);
    assert_eq!(ws.store().row_count().unwrap(), 10);
    assert_eq!(snapshot_rows(&ws.config().flat_file.path).len(), 3);
}

#[test]
fn schema_mismatch_aborts_before_anything_is_persisted() {
    let ws = Workspace::new();
    let header = "Timestamp,System ON,Power Consumption (kW),Voltage (V),Site";
    let input = ws.drop_file("powerbox.csv", header, &ROWS[..2]);

    let err = ws.pipeline().run_on(&input, day()).unwrap_err();
    match err {
        PipelineError::SchemaMismatch { missing, extra } => {
            assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["Customer Profile"]);
            assert_eq!(extra.into_iter().collect::<Vec<_>>(), vec!["Site"]);
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
    assert!(!ws.config().relational.store.exists());
    assert!(!ws.config().flat_file.path.exists());
    // The dated rename is not rolled back
    assert!(ws.path("incoming/powerbox_20240102.csv").exists());
}

#[test]
fn coercion_failure_aborts_the_run() {
    let ws = Workspace::new();
    let input = ws.drop_file(
        "powerbox.csv",
        HEADER,
        &["01/01/2024 00:00,True,lots,230,home"],
    );
    let err = ws.pipeline().run_on(&input, day()).unwrap_err();
    assert!(matches!(err, PipelineError::TypeCoercion { ref column, .. } if column == "Power Consumption (kW)"));
    assert!(!ws.config().flat_file.path.exists());
}

#[test]
fn archive_failure_does_not_fail_the_run() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.path("archive")).unwrap();
    // Different content under the name the input will be archived as
    fs::write(ws.path("archive/powerbox_20240102.csv"), "unrelated\n").unwrap();
    let input = ws.drop_file("powerbox.csv", HEADER, ROWS);

    let report = ws.pipeline().run_on(&input, day()).unwrap();

    assert_eq!(report.archived_path, None);
    assert_eq!(ws.store().row_count().unwrap(), 7);
    assert!(ws.path("incoming/powerbox_20240102.csv").exists());
}

#[test]
fn unarchived_rerun_does_not_append_twice() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.path("archive")).unwrap();
    fs::write(ws.path("archive/powerbox_20240102.csv"), "unrelated\n").unwrap();
    let input = ws.drop_file("powerbox.csv", HEADER, ROWS);
    ws.pipeline().run_on(&input, day()).unwrap();

    // The file stayed in place, so it can be run again
    let again = ws.pipeline().run_on(&ws.path("incoming/powerbox_20240102.csv"), day()).unwrap();

    assert!(again
        .sinks
        .iter()
        .any(|s| matches!(s.outcome, SinkOutcome::Skipped { .. })));
    assert_eq!(ws.store().row_count().unwrap(), 7);
}
