use std::io;
use std::path::PathBuf;

use pkgvault_types::BlobId;

/// Errors from blob store operations.
///
/// A verification callback rejecting content is not an error; it comes back
/// as the inner `Err` of the `*_with` operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob is not in this store.
    #[error("blob not found: {0}")]
    NotFound(BlobId),

    /// An existing store root lacks one of its required subdirectories.
    #[error("store directory {root:?} exists but {missing:?} does not")]
    MissingDirectory { root: PathBuf, missing: PathBuf },

    /// No store exists at this root.
    #[error("no blob store at {0:?}")]
    NoStore(PathBuf),

    /// The store root exists but is not a directory.
    #[error("store root {0:?} is not a directory")]
    NotADirectory(PathBuf),

    /// Moving a caller's file into staging failed, e.g. because it lives on
    /// another filesystem.
    #[error("cannot move {path:?} into the store: {source}")]
    Consume {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The atomic rename publishing a staged blob failed.
    #[error("failed to commit blob {id}: {source}")]
    Commit {
        id: BlobId,
        #[source]
        source: io::Error,
    },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Returns `true` if this error means the blob does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Attach a blob id to a not-found I/O error raised while reading it.
    pub(crate) fn reading(id: BlobId, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(id)
        } else {
            Self::Io(err)
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
