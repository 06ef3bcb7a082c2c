// Pipeline ingestion: dated rename, archive deduplication, and file parsing

pub mod archive_index;
pub mod reader;

pub use archive_index::{ArchiveIndex, ArchivedFile, ReconcileStats};
pub use reader::{read_records, InputFormat};

use chrono::{Local, NaiveDate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::constants::RENAME_DATE_FORMAT;
use crate::domain::RawRecordSet;
use crate::error::{PipelineError, Result};
use crate::gateway::{hash_file, FileDigest};

/// A parsed input file that has not been seen in the archive before.
#[derive(Debug)]
pub struct IngestedFile {
    pub records: RawRecordSet,
    /// Where the source file lives after the dated rename.
    pub renamed_path: PathBuf,
    pub digest: FileDigest,
}

/// Ingest `path` using today's local date for the rename.
pub fn ingest(path: &Path, archive_dir: &Path) -> Result<IngestedFile> {
    ingest_on(path, archive_dir, Local::now().date_naive())
}

/// Rename the file with `date`, reject content already archived, then parse it.
///
/// The rename happens before the duplicate check and is not undone when a
/// later step fails.
#[instrument(skip(archive_dir), fields(archive = %archive_dir.display()))]
pub fn ingest_on(path: &Path, archive_dir: &Path, date: NaiveDate) -> Result<IngestedFile> {
    let format = InputFormat::detect(path)?;
    let renamed_path = rename_with_date(path, date)?;

    let digest = hash_file(&renamed_path)?.ok_or_else(|| {
        PipelineError::io(
            format!("hashing {}", renamed_path.display()),
            io::Error::new(io::ErrorKind::NotFound, "renamed file disappeared"),
        )
    })?;

    let index = ArchiveIndex::open(archive_dir)?;
    if let Some(archived) = index.find(&digest)? {
        warn!(
            "{} matches archived file {} ({})",
            renamed_path.display(),
            archived.display(),
            digest.short()
        );
        crate::metrics::PipelineMetrics::record_duplicate_file();
        return Err(PipelineError::DuplicateFile {
            path: renamed_path,
            digest: digest.to_string(),
            archived,
        });
    }

    let records = read_records(&renamed_path, format)?;
    info!(
        "Ingested {} rows from {} ({})",
        records.len(),
        renamed_path.display(),
        digest.short()
    );
    crate::metrics::PipelineMetrics::record_rows_ingested(records.len());

    Ok(IngestedFile {
        records,
        renamed_path,
        digest,
    })
}

/// `<dir>/<stem>.<ext>` becomes `<dir>/<stem>_<YYYYMMDD>.<ext>`.
///
/// A file already carrying the date suffix is left where it is. An existing
/// file at the target name is never overwritten.
pub fn rename_with_date(path: &Path, date: NaiveDate) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PipelineError::UnsupportedFormat { path: path.to_path_buf() })?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| PipelineError::UnsupportedFormat { path: path.to_path_buf() })?;
    let suffix = date.format(RENAME_DATE_FORMAT).to_string();

    if !path.is_file() {
        return Err(PipelineError::io(
            format!("renaming {}", path.display()),
            io::Error::new(io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    if stem.ends_with(&format!("_{suffix}")) {
        return Ok(path.to_path_buf());
    }

    let target = path.with_file_name(format!("{stem}_{suffix}.{ext}"));
    if target.exists() {
        return Err(PipelineError::io(
            format!("renaming {} to {}", path.display(), target.display()),
            io::Error::new(io::ErrorKind::AlreadyExists, "target name already taken"),
        ));
    }
    fs::rename(path, &target).map_err(|e| {
        PipelineError::io(format!("renaming {} to {}", path.display(), target.display()), e)
    })?;
    info!("Renamed {} -> {}", path.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 5).unwrap()
    }

    #[test]
    fn rename_appends_date_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("powerbox.csv");
        fs::write(&src, "a\n1\n").unwrap();
        let renamed = rename_with_date(&src, day()).unwrap();
        assert_eq!(renamed, dir.path().join("powerbox_20241205.csv"));
        assert!(!src.exists());
        assert!(renamed.exists());
    }

    #[test]
    fn already_dated_file_is_not_renamed_twice() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("powerbox_20241205.csv");
        fs::write(&src, "a\n1\n").unwrap();
        assert_eq!(rename_with_date(&src, day()).unwrap(), src);
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("powerbox.csv");
        fs::write(&src, "new").unwrap();
        fs::write(dir.path().join("powerbox_20241205.csv"), "old").unwrap();
        assert!(matches!(rename_with_date(&src, day()), Err(PipelineError::Io { .. })));
        assert_eq!(fs::read_to_string(&src).unwrap(), "new");
    }

    #[test]
    fn unsupported_extension_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("powerbox.json");
        fs::write(&src, "{}").unwrap();
        let err = ingest_on(&src, &dir.path().join("archive"), day()).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert!(src.exists());
    }

    #[test]
    fn archived_content_is_rejected_under_any_name() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join("old_20240101.csv"), "a,b\n1,2\n").unwrap();

        let src = dir.path().join("fresh.csv");
        fs::write(&src, "a,b\n1,2\n").unwrap();
        let err = ingest_on(&src, &archive, day()).unwrap_err();
        match err {
            PipelineError::DuplicateFile { path, archived, .. } => {
                assert_eq!(path, dir.path().join("fresh_20241205.csv"));
                assert_eq!(archived, archive.join("old_20240101.csv"));
            }
            other => panic!("expected DuplicateFile, got {other:?}"),
        }
    }

    #[test]
    fn new_content_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("fresh.csv");
        fs::write(&src, "a,b\n1,2\n3,4\n").unwrap();
        let ingested = ingest_on(&src, &dir.path().join("archive"), day()).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.renamed_path, dir.path().join("fresh_20241205.csv"));
    }
}
