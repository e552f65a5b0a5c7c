//! Job-scoped scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::MediaResult;

/// A temporary working directory for one assembly step.
///
/// Holds the concat manifest, the synthesized audio track and extracted
/// continuity frames. The directory and its contents are removed when the
/// value drops, success or not, bounding disk usage per job.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh scratch directory.
    pub fn new() -> MediaResult<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("adreel-").tempdir()?,
        })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write bytes into the scratch directory and return the path.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> MediaResult<PathBuf> {
        let path = self.file(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Read a file from the scratch directory.
    pub async fn read(&self, name: &str) -> MediaResult<Vec<u8>> {
        Ok(tokio::fs::read(self.file(name)).await?)
    }
}
