//! Digesting entity (C3): a wrapping `Read` that maintains a running MD5
//! digest and byte count as the underlying body is read, for end-to-end
//! integrity verification against the server's computed MD5 (§4.3).
//!
//! Modeled on an ETag computation style (`format!("{:x}", md5::compute(data))`),
//! generalized from a one-shot digest over a buffered part to a streaming
//! digest over any reader.

use md5::{Digest, Md5};
use std::io::{self, Read};

/// Wraps a reader, updating a running MD5 digest and byte counter as bytes
/// pass through. The digest is only final once the reader is fully drained.
pub struct DigestingReader<R> {
    inner: R,
    hasher: Md5,
    bytes_read: u64,
}

impl<R: Read> DigestingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Base64-encoded MD5 digest of all bytes read so far, in the form
    /// expected by the `Content-MD5` header.
    pub fn digest_base64(&self) -> String {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        STANDARD.encode(self.hasher.clone().finalize())
    }

    /// Lower-case hex MD5 digest, in the form servers return as an ETag.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}
