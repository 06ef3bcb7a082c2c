use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::traits::{RunContext, Sink, SinkOutcome};
use crate::constants::TIMESTAMP_OUTPUT_FORMAT;
use crate::domain::{CleanedRecordSet, ColumnData};
use crate::error::{PipelineError, Result};
use crate::gateway::FileDigest;

/// Appends cleaned rows to a SQLite table.
///
/// Each write also records the input digest in an `ingest_runs` ledger in
/// the same transaction; a digest already in the ledger for this table is
/// not appended a second time.
pub struct SqliteSink {
    store: PathBuf,
    table: String,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteSink {
    pub fn new(store: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            table: table.into(),
        }
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.store.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }
        let conn = Connection::open(&self.store)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_runs (
                digest        TEXT NOT NULL,
                table_name    TEXT NOT NULL,
                source_file   TEXT NOT NULL,
                row_count     INTEGER NOT NULL,
                run_id        TEXT NOT NULL,
                persisted_at  TEXT NOT NULL,
                PRIMARY KEY (digest, table_name)
            );
            "#,
        )?;
        Ok(conn)
    }

    /// Create the table on first use and add any columns it lacks.
    fn ensure_table(conn: &Connection, table: &str, records: &CleanedRecordSet) -> Result<()> {
        let defs: Vec<String> = records
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(c.name()), c.kind().sql_type()))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            quote_ident(table),
            defs.join(", ")
        ))?;

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let existing: HashSet<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<_, _>>()?;
        for column in records.columns() {
            if !existing.contains(column.name()) {
                warn!("Adding column '{}' to table '{}'", column.name(), table);
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    quote_ident(table),
                    quote_ident(column.name()),
                    column.kind().sql_type()
                ))?;
            }
        }
        Ok(())
    }

    fn cell(data: &ColumnData, row: usize) -> Value {
        match data {
            ColumnData::Float(v) => v[row].map_or(Value::Null, Value::Real),
            ColumnData::Boolean(v) => v[row].map_or(Value::Null, |b| Value::Integer(b as i64)),
            ColumnData::Categorical(v) => v[row].clone().map_or(Value::Null, Value::Text),
            ColumnData::Timestamp(v) => v[row].map_or(Value::Null, |t| {
                Value::Text(t.format(TIMESTAMP_OUTPUT_FORMAT).to_string())
            }),
        }
    }

    /// Whether rows for this digest were already appended to this table.
    pub fn ledger_contains(&self, digest: &FileDigest) -> Result<bool> {
        let conn = self.open()?;
        Self::ledger_has(&conn, &self.table, digest)
    }

    fn ledger_has(conn: &Connection, table: &str, digest: &FileDigest) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM ingest_runs WHERE digest = ?1 AND table_name = ?2",
                params![digest.as_str(), table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Rows currently in the table, zero if it does not exist yet.
    pub fn row_count(&self) -> Result<usize> {
        let conn = self.open()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(0);
        }
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table)),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&self, records: &CleanedRecordSet, ctx: &RunContext) -> Result<SinkOutcome> {
        let mut conn = self.open()?;
        if Self::ledger_has(&conn, &self.table, &ctx.digest)? {
            warn!(
                "Rows for {} ({}) already in {}; not appending again",
                ctx.source_file,
                ctx.digest.short(),
                self.store.display()
            );
            return Ok(SinkOutcome::Skipped {
                reason: format!("digest {} already persisted", ctx.digest.short()),
            });
        }

        let tx = conn.transaction()?;
        Self::ensure_table(&tx, &self.table, records)?;
        {
            let names: Vec<String> = records.columns().iter().map(|c| quote_ident(c.name())).collect();
            let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.table),
                names.join(", "),
                placeholders.join(", ")
            );
            let mut stmt = tx.prepare(&sql)?;
            for row in 0..records.n_rows() {
                let values: Vec<Value> = records.columns().iter().map(|c| Self::cell(c.data(), row)).collect();
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.execute(
            "INSERT INTO ingest_runs (digest, table_name, source_file, row_count, run_id, persisted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ctx.digest.as_str(),
                self.table,
                ctx.source_file,
                records.n_rows() as i64,
                ctx.run_id.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        debug!("Committed {} rows to {}", records.n_rows(), self.table);
        info!(
            "Appended {} rows to {}:{}",
            records.n_rows(),
            self.store.display(),
            self.table
        );
        Ok(SinkOutcome::Written {
            rows: records.n_rows(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, TypedRecordSet};
    use crate::gateway::hash_bytes;
    use crate::pipeline::processing::impute;
    use uuid::Uuid;

    fn cleaned() -> CleanedRecordSet {
        impute(TypedRecordSet::new(vec![
            Column::float("Voltage (V)", vec![Some(230.0), Some(231.5)]),
            Column::boolean("System ON", vec![Some(true), Some(false)]),
            Column::categorical("Battery \"Tech\"", vec![Some("Li-ion".into()), Some("Lead".into())]),
        ]))
        .unwrap()
    }

    fn ctx(content: &[u8]) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            digest: hash_bytes(content),
            source_file: "powerbox_20241205.csv".to_string(),
        }
    }

    #[test]
    fn appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("db/solar.db"), "cleaned_solar_data");
        assert_eq!(sink.row_count().unwrap(), 0);

        sink.write(&cleaned(), &ctx(b"one")).unwrap();
        sink.write(&cleaned(), &ctx(b"two")).unwrap();
        assert_eq!(sink.row_count().unwrap(), 4);
    }

    #[test]
    fn same_digest_is_not_appended_twice() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("solar.db"), "t");
        let run = ctx(b"same");

        assert_eq!(sink.write(&cleaned(), &run).unwrap(), SinkOutcome::Written { rows: 2 });
        assert!(matches!(sink.write(&cleaned(), &run).unwrap(), SinkOutcome::Skipped { .. }));
        assert_eq!(sink.row_count().unwrap(), 2);
        assert!(sink.ledger_contains(&run.digest).unwrap());
    }

    #[test]
    fn same_digest_goes_to_each_table_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("solar.db");
        let daily = SqliteSink::new(&store, "daily");
        let backfill = SqliteSink::new(&store, "backfill");
        let run = ctx(b"shared");

        assert_eq!(daily.write(&cleaned(), &run).unwrap(), SinkOutcome::Written { rows: 2 });
        assert_eq!(backfill.write(&cleaned(), &run).unwrap(), SinkOutcome::Written { rows: 2 });
        assert!(matches!(backfill.write(&cleaned(), &run).unwrap(), SinkOutcome::Skipped { .. }));
        assert_eq!(daily.row_count().unwrap(), 2);
        assert_eq!(backfill.row_count().unwrap(), 2);
    }

    #[test]
    fn booleans_are_stored_as_integers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::new(dir.path().join("solar.db"), "t");
        sink.write(&cleaned(), &ctx(b"x")).unwrap();

        let conn = Connection::open(sink.store()).unwrap();
        let on: i64 = conn
            .query_row("SELECT \"System ON\" FROM t WHERE \"Voltage (V)\" = 230.0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }
}
