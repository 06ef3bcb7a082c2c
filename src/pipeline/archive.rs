use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::gateway::FileDigest;
use crate::pipeline::ingestion::ArchiveIndex;

/// Move a processed file into `archive_dir` and record it in the digest index.
///
/// Failures are logged and reported as `None`; by the time a file is archived
/// its rows are already persisted, so archiving never fails a run.
#[instrument(skip(digest), fields(archive = %archive_dir.display()))]
pub fn archive(renamed_path: &Path, archive_dir: &Path, digest: &FileDigest) -> Option<PathBuf> {
    match move_into(renamed_path, archive_dir) {
        Ok(target) => {
            info!("Archived {} -> {}", renamed_path.display(), target.display());
            if let Err(e) = ArchiveIndex::open(archive_dir).and_then(|index| index.record(&target, digest)) {
                // The next reconcile picks the file up anyway
                warn!("Could not index {}: {}", target.display(), e);
            }
            Some(target)
        }
        Err(e) => {
            warn!("Archiving {} failed: {}", renamed_path.display(), e);
            None
        }
    }
}

fn move_into(source: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        PipelineError::io(
            format!("archiving {}", source.display()),
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    if !source.is_file() {
        return Err(PipelineError::io(
            format!("archiving {}", source.display()),
            io::Error::new(io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    fs::create_dir_all(archive_dir)
        .map_err(|e| PipelineError::io(format!("creating {}", archive_dir.display()), e))?;

    let target = archive_dir.join(name);
    if target.exists() {
        return Err(PipelineError::io(
            format!("archiving to {}", target.display()),
            io::Error::new(io::ErrorKind::AlreadyExists, "archive already holds this name"),
        ));
    }
    if fs::rename(source, &target).is_err() {
        // rename cannot cross filesystems
        fs::copy(source, &target)
            .map_err(|e| PipelineError::io(format!("copying {} to {}", source.display(), target.display()), e))?;
        fs::remove_file(source)
            .map_err(|e| PipelineError::io(format!("removing {}", source.display()), e))?;
    }
    Ok(target)
}
