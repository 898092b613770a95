use std::fs;
use std::io;
use std::time::{Duration, SystemTime};

use pkgvault_types::{BlobHasher, BlobId};
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::layout::shard_names;
use crate::storage::BlobStorage;

/// Result of sweeping the staging directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub files_removed: usize,
    pub files_kept: usize,
    pub bytes_freed: u64,
}

impl BlobStorage {
    /// Every committed blob id, sorted.
    ///
    /// Entries whose names are not ids, or that sit in the wrong shard, are
    /// not part of the store and are skipped.
    pub fn list(&self) -> StoreResult<Vec<BlobId>> {
        let mut ids = Vec::new();
        for shard in shard_names() {
            for entry in fs::read_dir(self.root().join(&shard))? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                match BlobId::from_hex(&name) {
                    Ok(id) if id.shard() == shard => ids.push(id),
                    _ => warn!(path = %entry.path().display(), "ignoring stray file in shard"),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Rehash a committed blob and compare against its id.
    pub fn verify(&self, id: &BlobId) -> StoreResult<bool> {
        let file = self.open_blob(id)?;
        let actual = BlobHasher::hash_reader(io::BufReader::new(file))?;
        if actual != *id {
            warn!(%id, %actual, "blob content does not match its id");
        }
        Ok(actual == *id)
    }

    /// Delete staging files last modified more than `older_than` ago.
    ///
    /// Younger files may belong to an add in flight on another handle and are
    /// kept. The sharded tree is never touched.
    pub fn sweep_incoming(&self, older_than: Duration) -> StoreResult<SweepReport> {
        let now = SystemTime::now();
        let mut report = SweepReport::default();
        for entry in fs::read_dir(self.incoming_dir())? {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Committed or discarded since the listing.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let age = now
                .duration_since(meta.modified()?)
                .unwrap_or(Duration::ZERO);
            if !meta.is_file() || age < older_than {
                report.files_kept += 1;
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    warn!(path = %entry.path().display(), age_secs = age.as_secs(), "removed stale staging file");
                    report.files_removed += 1;
                    report.bytes_freed += meta.len();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            removed = report.files_removed,
            kept = report.files_kept,
            "swept staging directory"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, BlobStorage) {
        let tmp = TempDir::new().unwrap();
        let store = BlobStorage::open(tmp.path().join("blobs")).unwrap();
        (tmp, store)
    }

    #[test]
    fn list_empty_store() {
        let (_tmp, store) = new_store();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn list_returns_committed_ids_sorted() {
        let (_tmp, store) = new_store();
        let mut expected: Vec<BlobId> = ["a", "b", "c", "d"]
            .iter()
            .map(|s| store.add(s).unwrap())
            .collect();
        store.add("a").unwrap();
        expected.sort();
        assert_eq!(store.list().unwrap(), expected);
    }

    #[test]
    fn list_skips_stray_files_and_staging() {
        let (_tmp, store) = new_store();
        let id = store.add("real").unwrap();
        fs::write(store.root().join("00").join("notes.txt"), b"x").unwrap();
        let misplaced = BlobId::from_bytes(b"misplaced");
        let wrong_shard = if misplaced.shard() == "01" { "02" } else { "01" };
        fs::write(store.root().join(wrong_shard).join(misplaced.to_hex()), b"misplaced").unwrap();
        fs::write(store.incoming_dir().join("blob-orphan.tmp"), b"orphan").unwrap();
        assert_eq!(store.list().unwrap(), vec![id]);
    }

    #[test]
    fn verify_detects_tampering() {
        let (_tmp, store) = new_store();
        let id = store.add("original").unwrap();
        assert!(store.verify(&id).unwrap());
        fs::write(store.filepath(&id), b"tampered").unwrap();
        assert!(!store.verify(&id).unwrap());
    }

    #[test]
    fn verify_unknown_is_not_found() {
        let (_tmp, store) = new_store();
        let err = store.verify(&BlobId::from_bytes(b"absent")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn sweep_removes_only_stale_staging_files() {
        let (_tmp, store) = new_store();
        let id = store.add("committed").unwrap();
        fs::write(store.incoming_dir().join("blob-orphan.tmp"), b"orphan").unwrap();

        let report = store.sweep_incoming(Duration::from_secs(3600)).unwrap();
        assert_eq!(report.files_removed, 0);
        assert_eq!(report.files_kept, 1);

        let report = store.sweep_incoming(Duration::ZERO).unwrap();
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.bytes_freed, 6);
        assert_eq!(fs::read_dir(store.incoming_dir()).unwrap().count(), 0);
        assert_eq!(store.fetch(&id).unwrap(), b"committed");
    }

    #[test]
    fn open_with_sweep_config_cleans_orphans() {
        let (tmp, store) = new_store();
        fs::write(store.incoming_dir().join("blob-orphan.tmp"), b"orphan").unwrap();
        let mut config = StoreConfig::new(tmp.path().join("blobs"));
        config.stale_staging_after_secs = Some(0);
        let reopened = BlobStorage::open_with_config(&config).unwrap();
        assert_eq!(fs::read_dir(reopened.incoming_dir()).unwrap().count(), 0);
    }

    #[test]
    fn plain_open_keeps_orphans() {
        let (tmp, store) = new_store();
        fs::write(store.incoming_dir().join("blob-orphan.tmp"), b"orphan").unwrap();
        let reopened = BlobStorage::open(tmp.path().join("blobs")).unwrap();
        assert_eq!(fs::read_dir(reopened.incoming_dir()).unwrap().count(), 1);
    }
}
