use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::TypeError;

/// Length of an MD5 digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// Length of the hex form of a [`BlobId`].
pub const HEX_LEN: usize = DIGEST_LEN * 2;

/// Content-derived identifier for a stored blob.
///
/// A `BlobId` is the MD5 digest of a blob's exact bytes. Identical content
/// always produces the same `BlobId`. Ids come into existence by hashing
/// content ([`BlobId::from_bytes`] or [`crate::BlobHasher`]); parsing is only
/// for reading back ids that were hashed earlier and persisted as text.
///
/// Ordering is byte-wise, which matches the ordering of the hex strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId([u8; DIGEST_LEN]);

impl BlobId {
    /// Compute a `BlobId` from bytes held in memory.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_digest(md5::compute(data))
    }

    pub(crate) fn from_digest(digest: md5::Digest) -> Self {
        Self(digest.0)
    }

    /// Parse the lowercase hex form of a previously derived id.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: HEX_LEN,
                actual: s.len(),
            });
        }
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(TypeError::NotLowercase(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The raw 16-byte digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex representation. This is the stable external form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Name of the shard directory holding this blob: the hex pair of the
    /// leading digest byte.
    pub fn shard(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.short_hex())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BlobId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for BlobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HexVisitor;

        impl Visitor<'_> for HexVisitor {
            type Value = BlobId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {HEX_LEN}-character lowercase hex blob id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BlobId, E> {
                BlobId::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}
