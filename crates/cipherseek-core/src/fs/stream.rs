//! Random-access decryption over a chunked container.
//!
//! [`DecryptingStream`] presents the plaintext of a container as a seekable
//! byte stream. Nothing is decrypted on open; each read maps the current
//! position to a chunk, loads and authenticates only the chunks it touches,
//! and copies the requested slice out. Recently used chunks stay in a small
//! LRU so sequential and nearby reads do not re-decrypt.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use cipherseek_core::crypto::{CipherKind, ContentKey};
//! use cipherseek_core::fs::{ChunkCodec, DecryptingStream, encrypt_bytes};
//!
//! let codec = ChunkCodec::new(CipherKind::Aes256Gcm.build(&ContentKey::random()))?;
//! let container = encrypt_bytes(&vec![b'A'; 70_000], &codec)?;
//!
//! let mut stream = DecryptingStream::open(Cursor::new(container), codec)?;
//! stream.seek_to(65_530)?;
//! assert_eq!(stream.read_up_to(20)?, vec![b'A'; 20]);
//! # Ok::<(), cipherseek_core::error::StreamError>(())
//! ```

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::{debug, instrument, trace, warn};
use zeroize::Zeroizing;

use super::codec::ChunkCodec;
use super::source::ByteSource;
use crate::crypto::AeadCipher;
use crate::error::{StreamContext, StreamError};

/// Tuning for a [`DecryptingStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Number of decrypted chunks kept resident. Zero is treated as one.
    pub cache_chunks: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { cache_chunks: 1 }
    }
}

/// Seekable plaintext view over an encrypted byte source.
///
/// Not safe for concurrent use; open one stream per reader. Several streams
/// may share the same underlying storage as long as each has its own
/// independent cursor.
///
/// The source is closed by [`close`](Self::close) or, failing that, when the
/// stream is dropped, including after a failed read.
pub struct DecryptingStream<S: ByteSource, C> {
    /// `None` only once released by `close`, `into_inner` or drop.
    source: Option<S>,
    codec: ChunkCodec<C>,
    encrypted_size: u64,
    plaintext_size: u64,
    position: u64,
    cache: LruCache<u64, Zeroizing<Vec<u8>>>,
    context: StreamContext,
}

impl<S: ByteSource, C: AeadCipher> DecryptingStream<S, C> {
    /// Open a stream with a single-chunk cache.
    pub fn open(source: S, codec: ChunkCodec<C>) -> Result<Self, StreamError> {
        Self::open_with(source, codec, StreamOptions::default())
    }

    /// Open a stream.
    ///
    /// Only the source length is inspected; a length that cannot be split
    /// into chunks fails here with `MalformedFile` before any read.
    #[instrument(level = "debug", skip(source, codec), fields(cache_chunks = options.cache_chunks))]
    pub fn open_with(
        mut source: S,
        codec: ChunkCodec<C>,
        options: StreamOptions,
    ) -> Result<Self, StreamError> {
        let context = StreamContext::new().with_operation("open");

        let encrypted_size = source
            .size()
            .map_err(|e| StreamError::io_with_context(e, context.clone()))?;
        let layout = codec.layout();
        let plaintext_size = layout
            .plaintext_size(encrypted_size)
            .map_err(|e| e.with_context(&context))?;

        let capacity = NonZeroUsize::new(options.cache_chunks).unwrap_or(NonZeroUsize::MIN);

        debug!(
            encrypted_size,
            plaintext_size,
            chunks = layout.chunk_count(encrypted_size),
            algorithm = codec.cipher().algorithm(),
            "Opened encrypted stream"
        );

        Ok(Self {
            source: Some(source),
            codec,
            encrypted_size,
            plaintext_size,
            position: 0,
            cache: LruCache::new(capacity),
            context: StreamContext::new(),
        })
    }

    /// Attach context (typically the container path) to every error this
    /// stream reports.
    #[must_use]
    pub fn with_context(mut self, context: StreamContext) -> Self {
        self.context = context;
        self
    }

    /// Decrypted size in bytes.
    pub fn size(&self) -> u64 {
        self.plaintext_size
    }

    /// On-disk size of the container.
    pub fn encrypted_size(&self) -> u64 {
        self.encrypted_size
    }

    /// Current decrypted position.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.plaintext_size
    }

    pub fn codec(&self) -> &ChunkCodec<C> {
        &self.codec
    }

    /// Move to `pos`. `pos == size()` is valid and means EOF.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `pos > size()`; the position is left unchanged.
    pub fn seek_to(&mut self, pos: u64) -> Result<u64, StreamError> {
        if pos > self.plaintext_size {
            return Err(StreamError::OutOfRange {
                requested: pos,
                size: self.plaintext_size,
            });
        }
        trace!(from = self.position, to = pos, "Seek");
        self.position = pos;
        Ok(pos)
    }

    /// Read up to `max_len` bytes from the current position.
    ///
    /// Returns fewer bytes only at end of stream. An integrity failure aborts
    /// the read and is returned as an error, never as a short read.
    pub fn read_up_to(&mut self, max_len: usize) -> Result<Vec<u8>, StreamError> {
        let remaining = self.plaintext_size.saturating_sub(self.position);
        let want = usize::try_from(remaining).map_or(max_len, |r| r.min(max_len));

        let mut out = vec![0u8; want];
        let filled = self.read_into(&mut out)?;
        out.truncate(filled);
        Ok(out)
    }

    /// Positioned read: seek to `offset`, then read up to `len` bytes.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, StreamError> {
        self.seek_to(offset)?;
        self.read_up_to(len)
    }

    /// Fill `buf` from the current position, returning the number of bytes
    /// copied.
    ///
    /// On failure the position is left at the start of the chunk that
    /// failed, so retrying reproduces the same error. Bytes copied from
    /// earlier chunks in the same call stay consumed.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let remaining = self.plaintext_size.saturating_sub(self.position);
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if want == 0 {
            return Ok(0);
        }

        trace!(
            offset = self.position,
            requested = buf.len(),
            actual = want,
            "Reading range"
        );

        let layout = self.codec.layout();
        let mut filled = 0;

        while filled < want {
            let location = layout.locate(self.position);
            let offset = location.intra_chunk_offset;

            if let Err(e) = self.cache_chunk(location.chunk_index) {
                self.position = layout.chunk_to_decrypted_offset(location.chunk_index);
                return Err(e);
            }

            let (copied, chunk_len) = {
                let plaintext = self.cached_chunk(location.chunk_index)?;
                let available = plaintext.get(offset..).unwrap_or_default();
                let n = available.len().min(want - filled);
                buf[filled..filled + n].copy_from_slice(&available[..n]);
                (n, plaintext.len())
            };

            // A chunk shorter than its layout slot would stall the loop.
            if copied == 0 {
                return Err(StreamError::MalformedChunk {
                    actual: chunk_len,
                    minimum: offset + 1,
                    context: StreamContext::new()
                        .with_chunk(location.chunk_index)
                        .with_operation("read")
                        .merged_with(&self.context),
                });
            }

            filled += copied;
            self.position += copied as u64;
        }

        Ok(filled)
    }

    /// Release the source and discard all decrypted plaintext.
    ///
    /// Unlike the implicit close on drop, a failure to close is reported.
    pub fn close(mut self) -> Result<(), StreamError> {
        self.cache.clear();
        if let Some(mut source) = self.source.take() {
            source.close().map_err(|e| {
                StreamError::io_with_context(e, self.context.clone().with_operation("close"))
            })?;
        }
        debug!("Closed encrypted stream");
        Ok(())
    }

    /// Discard decrypted plaintext and hand back the source without closing
    /// it.
    pub fn into_inner(mut self) -> Option<S> {
        self.cache.clear();
        self.source.take()
    }

    fn cache_chunk(&mut self, chunk_index: u64) -> Result<(), StreamError> {
        if self.cache.contains(&chunk_index) {
            trace!(chunk = chunk_index, "Cache hit");
        } else {
            trace!(chunk = chunk_index, "Cache miss, reading from source");
            let plaintext = self.fetch_chunk(chunk_index)?;
            self.cache.put(chunk_index, plaintext);
        }
        Ok(())
    }

    fn cached_chunk(&mut self, chunk_index: u64) -> Result<&[u8], StreamError> {
        self.cache
            .get(&chunk_index)
            .map(|plaintext| plaintext.as_slice())
            .ok_or_else(|| StreamError::InvalidLayout {
                reason: "chunk cache cannot hold a chunk".to_string(),
            })
    }

    fn fetch_chunk(&mut self, chunk_index: u64) -> Result<Zeroizing<Vec<u8>>, StreamError> {
        let layout = self.codec.layout();
        let context = StreamContext::new()
            .with_chunk(chunk_index)
            .with_operation("read_chunk")
            .merged_with(&self.context);

        let Some(len) = layout.encrypted_chunk_len(chunk_index, self.encrypted_size) else {
            return Err(StreamError::OutOfRange {
                requested: layout.chunk_to_decrypted_offset(chunk_index),
                size: self.plaintext_size,
            });
        };

        let encrypted_size = self.encrypted_size;
        let Some(source) = self.source.as_mut() else {
            return Err(StreamError::io_with_context(
                io::Error::other("stream source already released"),
                context,
            ));
        };

        let mut encrypted = vec![0u8; len];
        source
            .seek(SeekFrom::Start(layout.chunk_to_encrypted_offset(chunk_index)))
            .map_err(|e| StreamError::io_with_context(e, context.clone()))?;
        source.read_exact(&mut encrypted).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StreamError::MalformedFile {
                    encrypted_size,
                    reason: "source ended inside a chunk".to_string(),
                    context: context.clone(),
                }
            } else {
                StreamError::io_with_context(e, context.clone())
            }
        })?;

        let is_final = layout.is_final_chunk(chunk_index, self.encrypted_size);
        self.codec
            .decrypt_indexed(chunk_index, is_final, &encrypted)
            .map_err(|e| e.with_context(&context))
    }
}

/// Each call stays within one chunk, so an error is only ever returned
/// before any byte of `buf` was filled.
impl<S: ByteSource, C: AeadCipher> Read for DecryptingStream<S, C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let layout = self.codec.layout();
        let intra = layout.locate(self.position).intra_chunk_offset;
        let len = buf.len().min(layout.plaintext_chunk_size() - intra);
        Ok(self.read_into(&mut buf[..len])?)
    }
}

/// Seeking past the end is rejected with `InvalidInput` rather than allowed
/// as it is for files, since there is nothing to decrypt there.
impl<S: ByteSource, C: AeadCipher> Seek for DecryptingStream<S, C> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.plaintext_size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            ));
        };
        Ok(self.seek_to(target)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl<S: ByteSource, C> Drop for DecryptingStream<S, C> {
    fn drop(&mut self) {
        self.cache.clear();
        if let Some(mut source) = self.source.take() {
            if let Err(e) = source.close() {
                warn!(error = %e, "Failed to close source of dropped stream");
            }
            trace!("DecryptingStream dropped without close()");
        }
    }
}

impl<S: ByteSource, C> fmt::Debug for DecryptingStream<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptingStream")
            .field("encrypted_size", &self.encrypted_size)
            .field("plaintext_size", &self.plaintext_size)
            .field("position", &self.position)
            .field("cached_chunks", &self.cache.len())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
