use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use pkgvault_types::{BlobHasher, BlobId, HashingWriter};
use tracing::{debug, instrument, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::layout::{self, INCOMING_DIR};
use crate::staging::StagedBlob;

/// Handle to a blob store rooted at a directory.
///
/// The handle holds no blob data and no locks. Any number of handles, in
/// this process or others, may share a root: all coordination goes through
/// unique staging names and atomic renames.
#[derive(Clone, Debug)]
pub struct BlobStorage {
    root: PathBuf,
    sync_on_commit: bool,
}

impl BlobStorage {
    /// Open the store at `root`, initializing it if absent or empty.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(&StoreConfig::new(root.as_ref()))
    }

    /// Open with explicit settings.
    pub fn open_with_config(config: &StoreConfig) -> StoreResult<Self> {
        layout::prepare(&config.root)?;
        let store = Self {
            root: config.root.clone(),
            sync_on_commit: config.sync_on_commit,
        };
        if let Some(age) = config.stale_staging_after() {
            store.sweep_incoming(age)?;
        }
        Ok(store)
    }

    /// Open a store that must already exist; a missing root is an error
    /// rather than a fresh store.
    pub fn open_existing(config: &StoreConfig) -> StoreResult<Self> {
        match fs::metadata(&config.root) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NoStore(config.root.clone()))
            }
            Err(e) => Err(e.into()),
            Ok(_) => Self::open_with_config(config),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join(INCOMING_DIR)
    }

    /// Where the blob with this id lives. Pure; the file may not exist.
    pub fn filepath(&self, id: &BlobId) -> PathBuf {
        layout::blob_path(&self.root, id)
    }

    // -----------------------------------------------------------------------
    // Adding
    // -----------------------------------------------------------------------

    /// Store bytes and return their id.
    pub fn add(&self, data: impl AsRef<[u8]>) -> StoreResult<BlobId> {
        let (staged, id) = self.stage_reader(data.as_ref())?;
        self.commit(staged, id)?;
        Ok(id)
    }

    /// Store bytes only if `check` accepts the staged content.
    ///
    /// A rejection is returned as the inner `Err` and leaves no trace in the
    /// store.
    pub fn add_with<T, E, F>(
        &self,
        data: impl AsRef<[u8]>,
        check: F,
    ) -> StoreResult<Result<(T, BlobId), E>>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let (staged, id) = self.stage_reader(data.as_ref())?;
        self.check_then_commit(staged, id, check)
    }

    /// Stream a reader to staging, hashing as it is written, then commit.
    pub fn add_reader<R: Read>(&self, reader: R) -> StoreResult<BlobId> {
        let (staged, id) = self.stage_reader(reader)?;
        self.commit(staged, id)?;
        Ok(id)
    }

    /// Streaming counterpart of [`BlobStorage::add_with`].
    pub fn add_reader_with<R, T, E, F>(
        &self,
        reader: R,
        check: F,
    ) -> StoreResult<Result<(T, BlobId), E>>
    where
        R: Read,
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let (staged, id) = self.stage_reader(reader)?;
        self.check_then_commit(staged, id, check)
    }

    /// Move an existing file into the store.
    ///
    /// The source must be on the same filesystem as the store; it is renamed,
    /// never copied, and is gone afterwards.
    pub fn consume_file(&self, source: impl AsRef<Path>) -> StoreResult<BlobId> {
        let (staged, id) = self.stage_file(source.as_ref())?;
        self.commit(staged, id)?;
        Ok(id)
    }

    /// Move an existing file into the store if `check` accepts it.
    ///
    /// The source is moved before `check` runs, so it is gone even when the
    /// content is rejected.
    pub fn consume_file_with<T, E, F>(
        &self,
        source: impl AsRef<Path>,
        check: F,
    ) -> StoreResult<Result<(T, BlobId), E>>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let (staged, id) = self.stage_file(source.as_ref())?;
        self.check_then_commit(staged, id, check)
    }

    fn stage_reader<R: Read>(&self, mut reader: R) -> StoreResult<(StagedBlob, BlobId)> {
        let (staged, file) = StagedBlob::create(&self.incoming_dir())?;
        let mut writer = HashingWriter::new(BufWriter::new(file));
        io::copy(&mut reader, &mut writer)?;
        let (buffered, id, size) = writer.finish();
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        if self.sync_on_commit {
            file.sync_all()?;
        }
        debug!(%id, size, staged = %staged.path().display(), "staged blob");
        Ok((staged, id))
    }

    fn stage_file(&self, source: &Path) -> StoreResult<(StagedBlob, BlobId)> {
        let consume_err = |source_err| StoreError::Consume {
            path: source.to_path_buf(),
            source: source_err,
        };
        // A symlink would be renamed as a link while its target got hashed.
        let meta = fs::symlink_metadata(source).map_err(consume_err)?;
        if !meta.file_type().is_file() {
            return Err(consume_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        // Hash through a handle that stays open across the rename so the id
        // describes the same file that ends up staged.
        let mut handle = File::open(source).map_err(consume_err)?;
        let id = BlobHasher::hash_reader(&mut handle)?;
        let staged = StagedBlob::adopt(&self.incoming_dir(), source).map_err(consume_err)?;
        if self.sync_on_commit {
            handle.sync_all()?;
        }
        debug!(%id, source = %source.display(), "staged consumed file");
        Ok((staged, id))
    }

    fn check_then_commit<T, E, F>(
        &self,
        staged: StagedBlob,
        id: BlobId,
        check: F,
    ) -> StoreResult<Result<(T, BlobId), E>>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let content = staged.read_all()?;
        match check(&content) {
            Ok(value) => {
                self.commit(staged, id)?;
                Ok(Ok((value, id)))
            }
            Err(rejection) => {
                if let Err(e) = staged.discard() {
                    warn!(%id, error = %e, "failed to remove rejected staging file");
                }
                debug!(%id, "blob rejected by verification");
                Ok(Err(rejection))
            }
        }
    }

    fn commit(&self, staged: StagedBlob, id: BlobId) -> StoreResult<()> {
        let dest = self.filepath(&id);
        // No existence check: an existing file with this digest holds the
        // same bytes, so overwriting it is harmless. This relies on MD5 not
        // colliding for real uploads.
        staged
            .commit(&dest)
            .map_err(|source| StoreError::Commit { id, source })?;
        debug!(%id, path = %dest.display(), "committed blob");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Read a committed blob in full.
    #[instrument(skip_all, fields(id = %id))]
    pub fn fetch(&self, id: &BlobId) -> StoreResult<Vec<u8>> {
        fs::read(self.filepath(id)).map_err(|e| StoreError::reading(*id, e))
    }

    /// Open a committed blob for streaming reads.
    pub fn open_blob(&self, id: &BlobId) -> StoreResult<File> {
        File::open(self.filepath(id)).map_err(|e| StoreError::reading(*id, e))
    }

    /// Copy a committed blob into `out` without buffering it whole.
    pub fn fetch_into<W: Write>(&self, id: &BlobId, out: &mut W) -> StoreResult<u64> {
        let mut file = self.open_blob(id)?;
        Ok(io::copy(&mut file, out)?)
    }

    /// Whether a blob with this id has been committed.
    pub fn contains(&self, id: &BlobId) -> StoreResult<bool> {
        match fs::metadata(self.filepath(id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Size in bytes of a committed blob.
    pub fn blob_size(&self, id: &BlobId) -> StoreResult<u64> {
        fs::metadata(self.filepath(id))
            .map(|m| m.len())
            .map_err(|e| StoreError::reading(*id, e))
    }
}
