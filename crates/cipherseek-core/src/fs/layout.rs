//! Chunk geometry and the mapping between decrypted and encrypted offsets.
//!
//! A container is a plain concatenation of chunks with no header:
//!
//! ```text
//! [nonce][ciphertext (≤ plaintext_chunk_size)][tag] [nonce][ciphertext][tag] ...
//! ```
//!
//! Every chunk except the last carries exactly `plaintext_chunk_size` bytes of
//! plaintext, so both address spaces can be mapped with integer arithmetic and
//! the total container length alone determines the geometry.

use crate::crypto::AeadCipher;
use crate::error::{StreamContext, StreamError};

// ============================================================================
// Constants
// ============================================================================

/// Size of the per-chunk nonce in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

/// Size of the AEAD authentication tag in bytes (128-bit).
pub const TAG_SIZE: usize = 16;

/// Default plaintext capacity per chunk (64 KiB).
pub const DEFAULT_CHUNK_PLAINTEXT_SIZE: usize = 65536;

/// Framing overhead per chunk (nonce + tag) for the default cipher sizes.
pub const CHUNK_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// On-disk size of a full chunk in the default layout.
pub const DEFAULT_CHUNK_ENCRYPTED_SIZE: usize = DEFAULT_CHUNK_PLAINTEXT_SIZE + CHUNK_OVERHEAD;

/// Which address space a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSide {
    Plaintext,
    Ciphertext,
}

/// Location of a decrypted offset inside the chunked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPosition {
    /// Zero-based chunk index
    pub chunk_index: u64,
    /// Encrypted offset where the chunk (its nonce) starts
    pub ciphertext_chunk_start: u64,
    /// Offset within the chunk's plaintext
    pub intra_chunk_offset: usize,
}

/// Fixed chunk geometry, chosen when a codec is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkLayout {
    plaintext_chunk_size: usize,
    nonce_size: usize,
    tag_size: usize,
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            plaintext_chunk_size: DEFAULT_CHUNK_PLAINTEXT_SIZE,
            nonce_size: NONCE_SIZE,
            tag_size: TAG_SIZE,
        }
    }
}

impl ChunkLayout {
    pub fn new(
        plaintext_chunk_size: usize,
        nonce_size: usize,
        tag_size: usize,
    ) -> Result<Self, StreamError> {
        if plaintext_chunk_size == 0 {
            return Err(StreamError::InvalidLayout {
                reason: "plaintext chunk size must be greater than zero".to_string(),
            });
        }
        if nonce_size == 0 {
            return Err(StreamError::InvalidLayout {
                reason: "nonce size must be greater than zero".to_string(),
            });
        }
        if plaintext_chunk_size
            .checked_add(nonce_size)
            .and_then(|n| n.checked_add(tag_size))
            .is_none()
        {
            return Err(StreamError::InvalidLayout {
                reason: format!("chunk size {plaintext_chunk_size} overflows with framing"),
            });
        }

        Ok(Self {
            plaintext_chunk_size,
            nonce_size,
            tag_size,
        })
    }

    /// Layout derived from a cipher's nonce and tag sizes.
    pub fn for_cipher<C: AeadCipher + ?Sized>(
        cipher: &C,
        plaintext_chunk_size: usize,
    ) -> Result<Self, StreamError> {
        Self::new(plaintext_chunk_size, cipher.nonce_size(), cipher.tag_size())
    }

    #[inline]
    pub fn plaintext_chunk_size(&self) -> usize {
        self.plaintext_chunk_size
    }

    #[inline]
    pub fn nonce_size(&self) -> usize {
        self.nonce_size
    }

    #[inline]
    pub fn tag_size(&self) -> usize {
        self.tag_size
    }

    /// Framing bytes per chunk (nonce + tag).
    #[inline]
    pub fn overhead(&self) -> usize {
        self.nonce_size + self.tag_size
    }

    /// On-disk size of a full chunk.
    #[inline]
    pub fn encrypted_chunk_size(&self) -> usize {
        self.plaintext_chunk_size + self.overhead()
    }

    #[inline]
    fn plain_u64(&self) -> u64 {
        self.plaintext_chunk_size as u64
    }

    #[inline]
    fn enc_u64(&self) -> u64 {
        self.encrypted_chunk_size() as u64
    }

    // ------------------------------------------------------------------------
    // Offset mapping
    //
    // Total over u64: results that would overflow saturate at u64::MAX, which
    // lies past the end of any real container.
    // ------------------------------------------------------------------------

    /// Map a decrypted offset to its chunk and the chunk's encrypted start.
    #[inline]
    pub fn locate(&self, decrypted_pos: u64) -> ChunkPosition {
        let chunk_index = decrypted_pos / self.plain_u64();
        ChunkPosition {
            chunk_index,
            ciphertext_chunk_start: self.chunk_to_encrypted_offset(chunk_index),
            intra_chunk_offset: (decrypted_pos % self.plain_u64()) as usize,
        }
    }

    /// Decrypted offset of the first byte of a chunk.
    #[inline]
    pub fn chunk_to_decrypted_offset(&self, chunk_index: u64) -> u64 {
        chunk_index.saturating_mul(self.plain_u64())
    }

    /// Encrypted offset of the start (nonce) of a chunk.
    #[inline]
    pub fn chunk_to_encrypted_offset(&self, chunk_index: u64) -> u64 {
        chunk_index.saturating_mul(self.enc_u64())
    }

    /// Encrypted offset of the ciphertext byte that holds a plaintext byte.
    ///
    /// Positions at or past the end clamp to `encrypted_size`.
    pub fn encrypted_data_position(&self, decrypted_pos: u64, encrypted_size: u64) -> u64 {
        let position = self.locate(decrypted_pos);
        let mapped = position
            .ciphertext_chunk_start
            .saturating_add(self.nonce_size as u64)
            .saturating_add(position.intra_chunk_offset as u64);
        mapped.min(encrypted_size)
    }

    /// Decrypted offset for an arbitrary encrypted offset.
    ///
    /// Offsets inside a nonce map to the chunk's first plaintext byte, offsets
    /// inside a tag map to the next chunk, and anything past the end clamps to
    /// `plaintext_size`.
    pub fn decrypted_position(&self, encrypted_pos: u64, plaintext_size: u64) -> u64 {
        let chunk_index = encrypted_pos / self.enc_u64();
        let within = (encrypted_pos % self.enc_u64()) as usize;

        let offset = within
            .saturating_sub(self.nonce_size)
            .min(self.plaintext_chunk_size);

        self.chunk_to_decrypted_offset(chunk_index)
            .saturating_add(offset as u64)
            .min(plaintext_size)
    }

    /// Chunk-aligned encrypted range `[start, end)` covering `len` bytes read
    /// at `encrypted_pos`.
    pub fn encrypted_span(&self, encrypted_pos: u64, len: u64) -> (u64, u64) {
        let chunk = self.enc_u64();
        let start = (encrypted_pos / chunk) * chunk;
        let end = encrypted_pos
            .saturating_add(len)
            .div_ceil(chunk)
            .saturating_mul(chunk);
        (start, end.max(start))
    }

    // ------------------------------------------------------------------------
    // Size computation
    // ------------------------------------------------------------------------

    /// Decrypted size of a container with the given on-disk length.
    ///
    /// A trailing remainder of exactly the framing overhead is a valid
    /// zero-length final chunk. A remainder smaller than that cannot hold a
    /// nonce and tag and is rejected.
    pub fn plaintext_size(&self, encrypted_size: u64) -> Result<u64, StreamError> {
        let full_chunks = encrypted_size / self.enc_u64();
        let remainder = encrypted_size % self.enc_u64();

        let mut plaintext_size = full_chunks * self.plain_u64();

        if remainder > 0 {
            let overhead = self.overhead() as u64;
            if remainder < overhead {
                return Err(StreamError::MalformedFile {
                    encrypted_size,
                    reason: format!(
                        "trailing chunk of {remainder} bytes is smaller than the {overhead}-byte framing"
                    ),
                    context: StreamContext::new().with_chunk(full_chunks),
                });
            }
            plaintext_size += remainder - overhead;
        }

        Ok(plaintext_size)
    }

    /// On-disk size produced by encrypting `plaintext_size` bytes.
    pub fn encrypted_size(&self, plaintext_size: u64) -> u64 {
        let full_chunks = plaintext_size / self.plain_u64();
        let remainder = plaintext_size % self.plain_u64();

        let encrypted_size = full_chunks.saturating_mul(self.enc_u64());
        if remainder > 0 {
            encrypted_size.saturating_add(remainder + self.overhead() as u64)
        } else {
            encrypted_size
        }
    }

    /// Number of chunks in a container of the given on-disk length.
    pub fn chunk_count(&self, encrypted_size: u64) -> u64 {
        encrypted_size.div_ceil(self.enc_u64())
    }

    /// On-disk length of a chunk, or `None` past the last chunk.
    pub fn encrypted_chunk_len(&self, chunk_index: u64, encrypted_size: u64) -> Option<usize> {
        let start = chunk_index.checked_mul(self.enc_u64())?;
        if start >= encrypted_size {
            return None;
        }
        Some((encrypted_size - start).min(self.enc_u64()) as usize)
    }

    /// Whether `chunk_index` is the last chunk of the container.
    pub fn is_final_chunk(&self, chunk_index: u64, encrypted_size: u64) -> bool {
        chunk_index.checked_add(1) == Some(self.chunk_count(encrypted_size))
    }

    /// Split a buffer into chunk-sized units of the given side.
    pub fn chunks<'a>(&self, data: &'a [u8], side: ChunkSide) -> std::slice::Chunks<'a, u8> {
        match side {
            ChunkSide::Plaintext => data.chunks(self.plaintext_chunk_size),
            ChunkSide::Ciphertext => data.chunks(self.encrypted_chunk_size()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
