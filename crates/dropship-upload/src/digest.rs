//! Content digests computed over the exact bytes that pass through a stream.

use std::fmt;
use std::io::{self, Read};

use md5::{Digest, Md5};

/// Byte length of a [`ContentDigest`].
pub const DIGEST_LEN: usize = 16;

/// MD5 fingerprint of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a digest from a slice, returning `None` when the length is wrong.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; DIGEST_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self::from_hasher(Md5::new_with_prefix(bytes))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    fn from_hasher(hasher: Md5) -> Self {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Reader adapter that hashes and counts every byte handed to the caller.
pub struct DigestReader<R> {
    inner: R,
    hasher: Md5,
    bytes: u64,
}

impl<R: Read> DigestReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
            bytes: 0,
        }
    }

    /// Bytes read so far.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Consume the adapter, returning the byte count and digest of everything read.
    #[must_use]
    pub fn finish(self) -> (u64, ContentDigest) {
        (self.bytes, ContentDigest::from_hasher(self.hasher))
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.hasher.update(&buf[..read]);
        self.bytes += read as u64;
        Ok(read)
    }
}

/// Drain a reader, returning its length and digest.
///
/// # Errors
///
/// Returns the first read error raised by `reader`.
pub fn digest_reader<R: Read>(reader: R) -> io::Result<(u64, ContentDigest)> {
    let mut digesting = DigestReader::new(reader);
    io::copy(&mut digesting, &mut io::sink())?;
    Ok(digesting.finish())
}
