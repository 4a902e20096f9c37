//! Incremental encryption into any [`std::io::Write`] sink.

use std::fmt;
use std::io::{self, Write};

use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use super::codec::ChunkCodec;
use super::transform::TransformStats;
use crate::crypto::AeadCipher;
use crate::error::{StreamContext, StreamError};

/// Streaming encryptor producing a chunked container.
///
/// Plaintext is buffered and a chunk is emitted only once more than a full
/// chunk is pending, so the last chunk is always known when it is sealed.
/// `finish()` seals whatever remains. Writing nothing produces an empty
/// container.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use cipherseek_core::crypto::{CipherKind, ContentKey};
/// use cipherseek_core::fs::{ChunkCodec, EncryptingWriter};
///
/// let codec = ChunkCodec::new(CipherKind::ChaCha20Poly1305.build(&ContentKey::random()))?;
/// let mut writer = EncryptingWriter::new(Vec::new(), codec);
/// writer.write_all(b"Hello, ")?;
/// writer.write_all(b"World!")?;
///
/// let (container, stats) = writer.finish()?;
/// assert_eq!(container.len(), 13 + 28);
/// assert_eq!(stats.chunks, 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EncryptingWriter<W: Write, C: AeadCipher> {
    sink: Option<W>,
    codec: ChunkCodec<C>,
    buffer: Zeroizing<Vec<u8>>,
    stats: TransformStats,
    context: StreamContext,
    finished: bool,
}

impl<W: Write, C: AeadCipher> EncryptingWriter<W, C> {
    pub fn new(sink: W, codec: ChunkCodec<C>) -> Self {
        let capacity = codec.layout().plaintext_chunk_size() + 1;
        Self {
            sink: Some(sink),
            codec,
            buffer: Zeroizing::new(Vec::with_capacity(capacity)),
            stats: TransformStats::default(),
            context: StreamContext::new(),
            finished: false,
        }
    }

    /// Attach context (typically the destination path) to reported errors.
    #[must_use]
    pub fn with_context(mut self, context: StreamContext) -> Self {
        self.context = context;
        self
    }

    /// Progress so far. Buffered plaintext is not counted until sealed.
    pub fn stats(&self) -> TransformStats {
        self.stats
    }

    /// Buffer plaintext, sealing every chunk that is known not to be last.
    #[instrument(level = "trace", skip(self, data), fields(data_len = data.len()))]
    pub fn append(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if self.finished {
            return Err(StreamError::Io {
                source: io::Error::other("writer already finished"),
                context: self.context.clone().with_operation("write"),
            });
        }

        let chunk_size = self.codec.layout().plaintext_chunk_size();
        let mut data = data;

        // Keep the buffer at most one byte over a chunk so large writes do
        // not hold the whole input in memory.
        while !data.is_empty() {
            let room = (chunk_size + 1).saturating_sub(self.buffer.len()).max(1);
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() > chunk_size {
                self.emit(chunk_size, false)?;
            }
        }

        Ok(())
    }

    /// Seal the remaining plaintext as the final chunk and return the sink.
    #[instrument(level = "debug", skip(self))]
    pub fn finish(mut self) -> Result<(W, TransformStats), StreamError> {
        self.finished = true;

        if !self.buffer.is_empty() {
            let len = self.buffer.len();
            self.emit(len, true)?;
        }

        let context = self.context.clone().with_operation("finish");
        let mut sink = self.take_sink(&context)?;
        sink.flush()
            .map_err(|e| StreamError::io_with_context(e, context))?;

        debug!(
            chunks = self.stats.chunks,
            plaintext_bytes = self.stats.plaintext_bytes,
            ciphertext_bytes = self.stats.ciphertext_bytes,
            "Encryption finished"
        );

        Ok((sink, self.stats))
    }

    /// Discard buffered plaintext and return the sink as-is.
    ///
    /// Chunks already emitted stay in the sink; the caller owns cleanup.
    pub fn abort(mut self) -> Option<W> {
        self.finished = true;
        self.buffer.clear();
        debug!(chunks = self.stats.chunks, "Encryption aborted");
        self.sink.take()
    }

    fn emit(&mut self, len: usize, is_final: bool) -> Result<(), StreamError> {
        let chunk_index = self.stats.chunks;
        let context = StreamContext::new()
            .with_chunk(chunk_index)
            .with_operation("write_chunk")
            .merged_with(&self.context);

        let chunk = self
            .codec
            .encrypt_indexed(chunk_index, is_final, &self.buffer[..len])
            .map_err(|e| e.with_context(&context))?;

        let Some(sink) = self.sink.as_mut() else {
            return Err(StreamError::io_with_context(
                io::Error::other("writer has no sink"),
                context,
            ));
        };
        sink.write_all(&chunk)
            .map_err(|e| StreamError::io_with_context(e, context))?;

        self.buffer.drain(..len);
        self.stats.chunks += 1;
        self.stats.plaintext_bytes += len as u64;
        self.stats.ciphertext_bytes += chunk.len() as u64;

        trace!(
            chunk = chunk_index,
            plaintext_size = len,
            is_final,
            "Chunk written"
        );
        Ok(())
    }

    fn take_sink(&mut self, context: &StreamContext) -> Result<W, StreamError> {
        self.sink.take().ok_or_else(|| {
            StreamError::io_with_context(io::Error::other("writer has no sink"), context.clone())
        })
    }
}

impl<W: Write, C: AeadCipher> Write for EncryptingWriter<W, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    /// Flushes the sink. Buffered plaintext stays pending until a full
    /// chunk is available or `finish()` is called.
    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write, C: AeadCipher> Drop for EncryptingWriter<W, C> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                chunks = self.stats.chunks,
                buffered = self.buffer.len(),
                "EncryptingWriter dropped without finish() - buffered plaintext discarded"
            );
        }
    }
}

impl<W: Write, C: AeadCipher> fmt::Debug for EncryptingWriter<W, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptingWriter")
            .field("chunks_written", &self.stats.chunks)
            .field("buffer_len", &self.buffer.len())
            .field("finished", &self.finished)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherKind, CipherSuite, ContentKey};
    use crate::fs::codec::ChunkAad;
    use crate::fs::transform::decrypt_bytes;

    fn codec(chunk_size: usize) -> ChunkCodec<CipherSuite> {
        ChunkCodec::new(CipherKind::Aes256Gcm.build(&ContentKey::random()))
            .unwrap()
            .with_chunk_size(chunk_size)
            .unwrap()
    }

    #[test]
    fn test_empty_write_produces_empty_container() {
        let writer = EncryptingWriter::new(Vec::new(), codec(16));
        let (container, stats) = writer.finish().unwrap();
        assert!(container.is_empty());
        assert_eq!(stats, TransformStats::default());
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let codec = codec(16);
        let mut writer = EncryptingWriter::new(Vec::new(), codec.clone());
        writer.write_all(&[1u8; 32]).unwrap();
        let (container, stats) = writer.finish().unwrap();

        assert_eq!(stats.chunks, 2);
        assert_eq!(container.len(), 2 * 44);
        assert_eq!(decrypt_bytes(&container, &codec).unwrap(), vec![1u8; 32]);
    }

    #[test]
    fn test_many_small_writes() {
        let codec = codec(16);
        let plaintext: Vec<u8> = (0..=200u8).collect();

        let mut writer = EncryptingWriter::new(Vec::new(), codec.clone());
        for piece in plaintext.chunks(3) {
            writer.write_all(piece).unwrap();
        }
        assert!(writer.stats().chunks >= 12);

        let (container, stats) = writer.finish().unwrap();
        assert_eq!(stats.plaintext_bytes, plaintext.len() as u64);
        assert_eq!(stats.ciphertext_bytes, container.len() as u64);
        assert_eq!(decrypt_bytes(&container, &codec).unwrap(), plaintext);
    }

    #[test]
    fn test_large_single_write_emits_incrementally() {
        let codec = codec(16);
        let mut writer = EncryptingWriter::new(Vec::new(), codec);
        writer.append(&[0u8; 1000]).unwrap();

        // Everything except the pending final chunk is already sealed
        assert_eq!(writer.stats().plaintext_bytes, 992);
        assert!(writer.buffer.len() <= 16);
        let (_, stats) = writer.finish().unwrap();
        assert_eq!(stats.plaintext_bytes, 1000);
    }

    #[test]
    fn test_final_chunk_flag_with_indexed_aad() {
        let codec = codec(16).with_aad(ChunkAad::Indexed(b"w".to_vec()));
        let mut writer = EncryptingWriter::new(Vec::new(), codec.clone());
        writer.write_all(&[9u8; 40]).unwrap();
        let (container, _) = writer.finish().unwrap();

        let last = &container[88..];
        assert!(codec.decrypt_indexed(2, true, last).is_ok());
        assert!(codec.decrypt_indexed(2, false, last).is_err());
        assert!(codec.decrypt_indexed(0, false, &container[..44]).is_ok());
    }

    #[test]
    fn test_abort_keeps_emitted_chunks_only() {
        let mut writer = EncryptingWriter::new(Vec::new(), codec(16));
        writer.write_all(&[0u8; 20]).unwrap();
        let sink = writer.abort().unwrap();
        assert_eq!(sink.len(), 44);
    }

    #[test]
    fn test_sink_error_carries_context() {
        struct FailingSink;

        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::StorageFull, "disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = EncryptingWriter::new(FailingSink, codec(16))
            .with_context(StreamContext::new().with_path("/out/file.enc"));
        let err = writer.append(&[0u8; 17]).unwrap_err();

        match err {
            StreamError::Io { source, context } => {
                assert_eq!(source.kind(), io::ErrorKind::StorageFull);
                assert_eq!(context.chunk_index, Some(0));
                assert!(context.path.is_some());
            }
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(writer.abort().is_some());
    }
}
