//! Content-addressed blob storage for pkgvault.
//!
//! A store is a directory holding one file per distinct blob, named by the
//! MD5 digest of its bytes and bucketed into 256 shard directories. Writes
//! are staged in `incoming/` and published with a single atomic rename.
//!
//! # Layout
//!
//! See [`layout`] for the on-disk contract consumed by backup and serving
//! tooling.
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once committed; the store never deletes or rewrites them.
//! 2. Stage, hash, verify, then commit-or-abort, in that order.
//! 3. A staged file is removed on every path that does not commit.
//! 4. Commit is a blind atomic rename: equal ids mean equal bytes.
//! 5. No in-process locks; concurrent handles coordinate through the filesystem.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod layout;
pub mod maintenance;
mod staging;
pub mod storage;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use maintenance::SweepReport;
pub use pkgvault_types::BlobId;
pub use storage::BlobStorage;
