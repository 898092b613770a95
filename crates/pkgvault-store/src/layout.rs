//! On-disk layout of a store root.
//!
//! ```text
//! <root>/
//!   incoming/            staging area, never part of the store
//!   00/ .. ff/           one shard per leading digest byte
//!     <32-hex-digest>    committed blob, raw bytes
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pkgvault_types::BlobId;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Name of the staging directory under the root.
pub const INCOMING_DIR: &str = "incoming";

/// Prefix of the scratch directory a new root is built in.
const INIT_PREFIX: &str = ".pkgvault-init-";

/// Number of shard directories.
pub const SHARD_COUNT: usize = 256;

/// Names of all shard directories, `00` through `ff`.
pub fn shard_names() -> impl Iterator<Item = String> {
    (0..=u8::MAX).map(|b| format!("{b:02x}"))
}

/// Every directory a valid store root must contain.
pub fn required_dirs(root: &Path) -> Vec<PathBuf> {
    std::iter::once(root.join(INCOMING_DIR))
        .chain(shard_names().map(|s| root.join(s)))
        .collect()
}

/// Canonical path of a blob: `<root>/<shard>/<hex>`.
pub fn blob_path(root: &Path, id: &BlobId) -> PathBuf {
    root.join(id.shard()).join(id.to_hex())
}

/// Create or validate the layout under `root`.
///
/// A missing or empty root is initialized. A non-empty root must already
/// hold every required directory; nothing is created in it.
///
/// A missing root is built beside its final location and renamed into
/// place, so concurrent openers never observe a partly built root. A root
/// that already exists empty is filled in place; openers racing on such a
/// root may see it partly built and fail with `MissingDirectory`.
pub fn prepare(root: &Path) -> StoreResult<()> {
    match fs::metadata(root) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => build_and_publish(root),
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.is_dir() => Err(StoreError::NotADirectory(root.to_path_buf())),
        Ok(_) => {
            if fs::read_dir(root)?.next().is_none() {
                create_all(root)?;
                info!(root = %root.display(), "initialized blob store");
                Ok(())
            } else {
                validate(root)
            }
        }
    }
}

fn build_and_publish(root: &Path) -> StoreResult<()> {
    let parent = match root.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let scratch = tempfile::Builder::new()
        .prefix(INIT_PREFIX)
        .tempdir_in(parent)?;
    create_all(scratch.path())?;
    match fs::rename(scratch.path(), root) {
        Ok(()) => {
            info!(root = %root.display(), "initialized blob store");
            Ok(())
        }
        // Another opener published its root first.
        Err(_) if root.is_dir() => validate(root),
        Err(e) => Err(e.into()),
    }
}

fn create_all(root: &Path) -> StoreResult<()> {
    for dir in required_dirs(root) {
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

fn validate(root: &Path) -> StoreResult<()> {
    for dir in required_dirs(root) {
        if !dir.is_dir() {
            return Err(StoreError::MissingDirectory {
                root: root.to_path_buf(),
                missing: dir,
            });
        }
    }
    debug!(root = %root.display(), "opened existing blob store");
    Ok(())
}
