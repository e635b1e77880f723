//! Artifact staging: the uploaded file's on-disk lifetime.
//!
//! Artifacts live at `<staging_dir>/<id>.<ext>`. Bytes are written to a
//! hidden `.partial` sibling, fsynced, then renamed into place, so a reader
//! never observes a half-written artifact.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StageError;

/// Extension used when the client filename carries none.
const FALLBACK_EXTENSION: &str = "bin";

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StageError + '_ {
    move |source| StageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Publishes `src` as `dst`. `rename` is atomic on the same filesystem; the
/// copy fallback covers staging dirs on odd mounts.
fn publish(src: &Path, dst: &Path) -> Result<(), StageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(io_err(dst))?;
    std::fs::remove_file(src).map_err(io_err(src))?;
    Ok(())
}

fn write_synced<R: Read>(path: &Path, bytes: &mut R) -> Result<(), StageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_err(path))?;
    std::io::copy(bytes, &mut file).map_err(io_err(path))?;
    file.flush().map_err(io_err(path))?;
    file.sync_all().map_err(io_err(path))?;
    Ok(())
}

/// Only `[A-Za-z0-9_-]`, so an id can never name a path outside the stage.
fn validate_id(id: &str) -> Result<(), StageError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StageError::InvalidId(id.to_string()))
    }
}

/// Lower-cased extension of a client filename, restricted to safe characters.
pub fn artifact_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

pub struct ArtifactStage {
    staging_dir: PathBuf,
}

impl ArtifactStage {
    /// Creates the stage, making sure the directory exists.
    pub fn new<P: AsRef<Path>>(staging_dir: P) -> Result<Self, StageError> {
        let staging_dir = staging_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&staging_dir).map_err(io_err(&staging_dir))?;
        Ok(Self { staging_dir })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Persists the uploaded bytes for a job and returns the artifact path.
    pub fn stage<R: Read>(
        &self,
        id: &str,
        extension: &str,
        mut bytes: R,
    ) -> Result<PathBuf, StageError> {
        validate_id(id)?;
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StageError::InvalidId(format!("{}.{}", id, extension)));
        }

        let target = self.staging_dir.join(format!("{}.{}", id, extension));
        let partial = self
            .staging_dir
            .join(format!(".{}.{}.partial", id, extension));

        let written = write_synced(&partial, &mut bytes).and_then(|_| publish(&partial, &target));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }

        // Make the rename itself durable.
        if let Ok(dir) = File::open(&self.staging_dir) {
            let _ = dir.sync_all();
        }

        log::debug!("Staged artifact {}", target.display());
        Ok(target)
    }

    /// Convenience wrapper for in-memory uploads.
    pub fn stage_bytes(
        &self,
        id: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StageError> {
        self.stage(id, extension, bytes)
    }

    /// Finds the published artifact for a job.
    pub fn resolve(&self, id: &str) -> Result<PathBuf, StageError> {
        validate_id(id)?;
        self.published_paths(id)?
            .into_iter()
            .next()
            .ok_or_else(|| StageError::NotFound(id.to_string()))
    }

    /// Removes the artifact for a job. Absence is not an error.
    pub fn discard(&self, id: &str) -> Result<(), StageError> {
        validate_id(id)?;
        for path in self.published_paths(id)? {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Discarded artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(&path)(e)),
            }
        }
        Ok(())
    }

    fn published_paths(&self, id: &str) -> Result<Vec<PathBuf>, StageError> {
        let entries = std::fs::read_dir(&self.staging_dir).map_err(io_err(&self.staging_dir))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(id)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}
