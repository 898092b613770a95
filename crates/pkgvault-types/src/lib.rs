//! Foundation types for pkgvault.
//!
//! This crate defines how a blob is identified. Every other pkgvault crate
//! depends on `pkgvault-types`.
//!
//! # Key Types
//!
//! - [`BlobId`] — Content-derived identifier (MD5 digest of the blob bytes)
//! - [`BlobHasher`] — Incremental hasher for streamed content
//! - [`HashingWriter`] — `Write` adapter that hashes bytes as they pass through

pub mod blob;
pub mod error;
pub mod hasher;

pub use blob::BlobId;
pub use error::TypeError;
pub use hasher::{BlobHasher, HashingWriter};
