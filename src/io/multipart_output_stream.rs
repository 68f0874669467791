//! Multipart output stream (C8): buffers trailing bytes so that every
//! sink except the last receives a whole multiple of the cipher's block
//! size, which CSE-over-MPU needs for independent per-part decryption.
//!
//! Ciphers and block alignment have no direct precedent elsewhere in this
//! crate, so this is built from the §4.8/§8 invariant text itself, in the
//! style of this codebase's other buffering code (streaming diff buffers),
//! one write-then-drain loop over an internal `Vec<u8>`.

use crate::error::{ClientError, Result};
use std::io::Write;

/// Buffers writes so that each switch of downstream sink only ever
/// receives whole blocks, with the tail carried into the next sink.
pub struct MultipartOutputStream {
    block_size: usize,
    buffer: Vec<u8>,
    current_sink: Option<Box<dyn Write + Send>>,
}

impl MultipartOutputStream {
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        Self {
            block_size,
            buffer: Vec::new(),
            current_sink: None,
        }
    }

    /// Switch the downstream sink without touching the buffered tail —
    /// the next `write` continues from where the last one left off.
    pub fn set_next(&mut self, sink: Box<dyn Write + Send>) {
        self.current_sink = Some(sink);
    }

    /// Append bytes, immediately emitting every full block to the current
    /// sink and retaining the sub-block remainder for the next write.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        let full_len = (self.buffer.len() / self.block_size) * self.block_size;
        if full_len > 0 {
            let emit: Vec<u8> = self.buffer.drain(..full_len).collect();
            self.emit(&emit)?;
        }
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        let sink = self
            .current_sink
            .as_mut()
            .ok_or_else(|| ClientError::multipart("write before a sink was set via set_next"))?;
        sink.write_all(bytes)
            .map_err(|e| ClientError::io(format!("failed writing to multipart sink: {e}"), false))
    }

    /// Emit the buffered tail to the current sink, but only if it is
    /// itself block-aligned (including the trivially-aligned empty case).
    /// Used between parts, where every sink but the very last must stay
    /// block-aligned for CTR-mode counter continuation across parts.
    pub fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.len() % self.block_size != 0 {
            return Err(ClientError::multipart(format!(
                "buffered tail of {} bytes is not a multiple of the block size {}",
                self.buffer.len(),
                self.block_size
            )));
        }
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.buffer);
        self.emit(&bytes)
    }

    /// Emit whatever remains in the buffer unconditionally, alignment or
    /// not. Used exactly once, for the object's true final part, where
    /// there is no next sink that needs block-aligned continuation.
    pub fn flush_final(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.buffer);
        self.emit(&bytes)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_full_blocks_retaining_tail() {
        let mut stream = MultipartOutputStream::new(16);
        let sink = Vec::new();
        stream.set_next(Box::new(sink));
        stream.write(&[1u8; 20]).unwrap();
        assert_eq!(stream.buffered_len(), 4);
    }

    #[test]
    fn flush_buffer_rejects_misaligned_tail() {
        let mut stream = MultipartOutputStream::new(16);
        stream.set_next(Box::new(Vec::new()));
        stream.write(&[1u8; 5]).unwrap();
        assert!(stream.flush_buffer().is_err());
    }

    #[test]
    fn flush_buffer_accepts_empty_tail() {
        let mut stream = MultipartOutputStream::new(16);
        stream.set_next(Box::new(Vec::new()));
        stream.write(&[1u8; 32]).unwrap();
        assert!(stream.flush_buffer().is_ok());
    }

    #[test]
    fn set_next_preserves_buffered_tail_across_sinks() {
        let mut stream = MultipartOutputStream::new(4);
        let sink_a: Vec<u8> = Vec::new();
        stream.set_next(Box::new(sink_a));
        stream.write(b"hello").unwrap(); // 5 bytes: 4 emitted, 1 buffered
        assert_eq!(stream.buffered_len(), 1);

        let sink_b: Vec<u8> = Vec::new();
        stream.set_next(Box::new(sink_b));
        stream.write(b"world!!!").unwrap(); // 1 + 8 = 9 -> 8 emitted, 1 buffered
        assert_eq!(stream.buffered_len(), 1);
    }

    #[test]
    fn flush_final_emits_unaligned_remainder() {
        let mut stream = MultipartOutputStream::new(16);
        stream.set_next(Box::new(Vec::new()));
        stream.write(&[9u8; 5]).unwrap();
        assert!(stream.flush_final().is_ok());
        assert_eq!(stream.buffered_len(), 0);
    }

    proptest::proptest! {
        #[test]
        fn every_non_final_sink_receives_block_multiple(
            chunks in proptest::collection::vec(proptest::collection::vec(0u8..=255, 0..40), 1..8)
        ) {
            let block_size = 16usize;
            let mut stream = MultipartOutputStream::new(block_size);
            let sink_lengths = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

            struct LenTrackingSink {
                lengths: std::sync::Arc<std::sync::Mutex<Vec<usize>>>,
                total: usize,
            }
            impl Write for LenTrackingSink {
                fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                    self.total += buf.len();
                    Ok(buf.len())
                }
                fn flush(&mut self) -> std::io::Result<()> {
                    Ok(())
                }
            }
            impl Drop for LenTrackingSink {
                fn drop(&mut self) {
                    self.lengths.lock().unwrap().push(self.total);
                }
            }

            for chunk in &chunks {
                stream.set_next(Box::new(LenTrackingSink { lengths: sink_lengths.clone(), total: 0 }));
                stream.write(chunk).unwrap();
                let _ = stream.flush_buffer();
            }
            stream.current_sink = None;

            let lengths = sink_lengths.lock().unwrap();
            for &len in lengths.iter().take(lengths.len().saturating_sub(1)) {
                proptest::prop_assert_eq!(len % block_size, 0);
            }
        }
    }
}
