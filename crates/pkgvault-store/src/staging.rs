use std::fs::{self, File};
use std::io;
use std::path::Path;

use tempfile::TempPath;

const STAGING_PREFIX: &str = "blob-";
const STAGING_SUFFIX: &str = ".tmp";

/// A not-yet-committed file in `incoming/`.
///
/// The staged file is deleted when the guard is dropped, so every exit path
/// that does not reach [`StagedBlob::commit`] (error, rejection, panic)
/// leaves nothing behind.
pub(crate) struct StagedBlob {
    path: TempPath,
}

impl StagedBlob {
    /// Create a uniquely named empty file in `incoming` and return it with an
    /// open write handle.
    pub(crate) fn create(incoming: &Path) -> io::Result<(Self, File)> {
        let (file, path) = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(incoming)?
            .into_parts();
        Ok((Self { path }, file))
    }

    /// Reserve a unique name in `incoming` and move `source` onto it.
    ///
    /// This is a plain rename, so it fails when `source` is on another
    /// filesystem. On failure the reserved name is removed and `source` is
    /// left where it was.
    pub(crate) fn adopt(incoming: &Path, source: &Path) -> io::Result<Self> {
        let (staged, placeholder) = Self::create(incoming)?;
        drop(placeholder);
        fs::rename(source, &staged.path)?;
        Ok(staged)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the staged content back in full.
    pub(crate) fn read_all(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Atomically rename the staged file to `dest`, replacing any file there.
    pub(crate) fn commit(self, dest: &Path) -> io::Result<()> {
        // On failure the returned TempPath is dropped, which deletes the file.
        self.path.persist(dest).map_err(|e| e.error)
    }

    /// Delete the staged file now, reporting any failure.
    pub(crate) fn discard(self) -> io::Result<()> {
        self.path.close()
    }
}
