use std::io::{self, Read, Write};

use crate::blob::BlobId;

/// Incremental MD5 hasher producing a [`BlobId`].
///
/// Feeding the same bytes in any chunking yields the same id as
/// [`BlobId::from_bytes`] over the concatenation.
pub struct BlobHasher {
    ctx: md5::Context,
}

impl BlobHasher {
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    /// Feed more bytes into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.ctx.consume(data);
    }

    /// Consume the hasher and return the id of everything fed so far.
    pub fn finish(self) -> BlobId {
        BlobId::from_digest(self.ctx.compute())
    }

    /// Hash a stream to its end.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<BlobId> {
        let mut hasher = Self::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.finish())
    }
}

impl Default for BlobHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for BlobHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer adapter that hashes every byte it forwards.
///
/// Only bytes the inner writer accepted are hashed, so a short write keeps
/// the digest in step with what actually reached the destination.
pub struct HashingWriter<W> {
    inner: W,
    hasher: BlobHasher,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: BlobHasher::new(),
            written: 0,
        }
    }

    /// Number of bytes forwarded so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Return the inner writer, the id of the forwarded bytes and their count.
    pub fn finish(self) -> (W, BlobId, u64) {
        (self.inner, self.hasher.finish(), self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
