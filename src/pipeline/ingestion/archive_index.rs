use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::constants::{INDEX_DB_NAME, INDEX_DIR_NAME};
use crate::error::{PipelineError, Result};
use crate::gateway::{hash_file, FileDigest};

/// One archived file known to the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedFile {
    /// Path relative to the archive root.
    pub path: PathBuf,
    pub digest: FileDigest,
    pub size: u64,
    pub indexed_at: String,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub hashed: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Digest lookup over every file under the archive directory.
///
/// Digests are persisted in `<archive>/.index/digests.db` keyed by relative
/// path together with size and mtime, so a file is only rehashed when it is
/// new or has changed on disk since it was last seen.
pub struct ArchiveIndex {
    root: PathBuf,
    conn: Connection,
}

impl ArchiveIndex {
    pub fn open<P: AsRef<Path>>(archive_dir: P) -> Result<Self> {
        let root = archive_dir.as_ref().to_path_buf();
        let db_path = root.join(INDEX_DIR_NAME).join(INDEX_DB_NAME);
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("creating {}", parent.display()), e))?;
        }
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS archived_files (
                path        TEXT PRIMARY KEY,
                digest      TEXT NOT NULL,
                size        INTEGER NOT NULL,
                modified    INTEGER NOT NULL,
                indexed_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS archived_files_digest ON archived_files (digest);
            "#,
        )?;
        Ok(Self { root, conn })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bring the index in line with the directory contents, then look up `digest`.
    pub fn find(&self, digest: &FileDigest) -> Result<Option<PathBuf>> {
        self.reconcile()?;
        self.lookup(digest)
    }

    /// Keyed lookup without touching the filesystem.
    pub fn lookup(&self, digest: &FileDigest) -> Result<Option<PathBuf>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM archived_files WHERE digest = ?1 ORDER BY path LIMIT 1")?;
        let mut rows = stmt.query(params![digest.as_str()])?;
        if let Some(row) = rows.next()? {
            let rel: String = row.get(0)?;
            Ok(Some(self.root.join(rel)))
        } else {
            Ok(None)
        }
    }

    /// Record a file that was just moved into the archive.
    pub fn record(&self, archived_path: &Path, digest: &FileDigest) -> Result<()> {
        let meta = fs::metadata(archived_path)
            .map_err(|e| PipelineError::io(format!("stat {}", archived_path.display()), e))?;
        let rel = self.relative(archived_path);
        self.upsert(&rel, digest, meta.len(), modified_nanos(&meta))
    }

    /// Hash new or changed files and forget files that disappeared.
    pub fn reconcile(&self) -> Result<ReconcileStats> {
        let mut known: HashMap<String, (i64, i64)> = HashMap::new();
        {
            let mut stmt = self.conn.prepare("SELECT path, size, modified FROM archived_files")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            })?;
            for row in rows {
                let (path, size, modified) = row?;
                known.insert(path, (size, modified));
            }
        }

        let mut stats = ReconcileStats::default();
        let mut seen = HashSet::new();
        for (path, size, modified) in self.scan() {
            let rel = self.relative(&path);
            seen.insert(rel.clone());
            let size_i = size as i64;
            if modified != UNKNOWN_MTIME && known.get(&rel) == Some(&(size_i, modified)) {
                stats.unchanged += 1;
                continue;
            }
            // File may vanish between listing and hashing
            if let Some(digest) = hash_file(&path)? {
                debug!("Indexed archived file {} ({})", rel, digest.short());
                self.upsert(&rel, &digest, size, modified)?;
                stats.hashed += 1;
            }
        }

        let stale: Vec<&String> = known.keys().filter(|k| !seen.contains(*k)).collect();
        for rel in stale {
            self.conn
                .execute("DELETE FROM archived_files WHERE path = ?1", params![rel])?;
            stats.removed += 1;
        }

        if stats.hashed > 0 || stats.removed > 0 {
            info!(
                "Archive index reconciled: {} hashed, {} unchanged, {} removed",
                stats.hashed, stats.unchanged, stats.removed
            );
        }
        Ok(stats)
    }

    /// Drop every entry and rehash the whole archive.
    pub fn rebuild(&self) -> Result<ReconcileStats> {
        self.conn.execute("DELETE FROM archived_files", [])?;
        self.reconcile()
    }

    pub fn entries(&self) -> Result<Vec<ArchivedFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, digest, size, indexed_at FROM archived_files ORDER BY path")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (path, digest, size, indexed_at) = row?;
            match FileDigest::from_hex(&digest) {
                Some(digest) => out.push(ArchivedFile {
                    path: PathBuf::from(path),
                    digest,
                    size: size as u64,
                    indexed_at,
                }),
                None => warn!("Ignoring malformed digest for {} in archive index", path),
            }
        }
        Ok(out)
    }

    fn upsert(&self, rel: &str, digest: &FileDigest, size: u64, modified: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO archived_files (path, digest, size, modified, indexed_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET digest=excluded.digest, size=excluded.size,
                 modified=excluded.modified, indexed_at=excluded.indexed_at",
            params![rel, digest.as_str(), size as i64, modified, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Regular files under the root, skipping the index's own directory.
    fn scan(&self) -> Vec<(PathBuf, u64, i64)> {
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == INDEX_DIR_NAME));
        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable archive entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => files.push((entry.into_path(), meta.len(), modified_nanos(&meta))),
                Err(e) => warn!("Skipping archive entry without metadata: {}", e),
            }
        }
        files
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}

const UNKNOWN_MTIME: i64 = -1;

fn modified_nanos(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(UNKNOWN_MTIME)
}
