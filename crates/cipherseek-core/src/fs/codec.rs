//! Single-chunk AEAD encoding.
//!
//! Each chunk is self-describing: `nonce ‖ ciphertext ‖ tag`. The nonce is
//! drawn fresh from the OS-seeded RNG for every call, so encryption is
//! non-deterministic while decryption is exact.

use std::borrow::Cow;

use rand::RngCore;
use tracing::warn;
use zeroize::Zeroizing;

use super::layout::{ChunkLayout, DEFAULT_CHUNK_PLAINTEXT_SIZE};
use crate::crypto::{AeadCipher, CipherError};
use crate::error::{StreamContext, StreamError};

/// Associated data bound to every chunk.
///
/// The policy is fixed when the codec is built. Reading a container with a
/// different policy than it was written with fails authentication on the
/// first chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChunkAad {
    /// Empty associated data.
    #[default]
    None,
    /// The same context bytes for every chunk.
    Fixed(Vec<u8>),
    /// `context ‖ chunk_index (u64 BE) ‖ final_flag (u8)`.
    ///
    /// Binds each chunk to its position and marks the last one, so chunks
    /// cannot be reordered or spliced between containers, and truncation
    /// that leaves at least one chunk is detected. An empty plaintext has no
    /// chunks at all, so a container with every chunk removed still decrypts
    /// as empty.
    Indexed(Vec<u8>),
}

impl ChunkAad {
    /// Associated data for one chunk.
    pub fn for_chunk(&self, chunk_index: u64, is_final: bool) -> Cow<'_, [u8]> {
        match self {
            ChunkAad::None => Cow::Borrowed(&[]),
            ChunkAad::Fixed(context) => Cow::Borrowed(context),
            ChunkAad::Indexed(context) => {
                let mut aad = Vec::with_capacity(context.len() + 9);
                aad.extend_from_slice(context);
                aad.extend_from_slice(&chunk_index.to_be_bytes());
                aad.push(u8::from(is_final));
                Cow::Owned(aad)
            }
        }
    }

    /// Whether the associated data depends on chunk position.
    pub fn is_positional(&self) -> bool {
        matches!(self, ChunkAad::Indexed(_))
    }
}

/// Encrypts and decrypts individual chunks with a fixed cipher and layout.
#[derive(Debug, Clone)]
pub struct ChunkCodec<C> {
    cipher: C,
    layout: ChunkLayout,
    aad: ChunkAad,
}

impl<C: AeadCipher> ChunkCodec<C> {
    /// Codec with the default 64 KiB chunk size and no associated data.
    pub fn new(cipher: C) -> Result<Self, StreamError> {
        let layout = ChunkLayout::for_cipher(&cipher, DEFAULT_CHUNK_PLAINTEXT_SIZE)?;
        Ok(Self {
            cipher,
            layout,
            aad: ChunkAad::None,
        })
    }

    /// Change the plaintext capacity per chunk.
    pub fn with_chunk_size(mut self, plaintext_chunk_size: usize) -> Result<Self, StreamError> {
        self.layout = ChunkLayout::for_cipher(&self.cipher, plaintext_chunk_size)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_aad(mut self, aad: ChunkAad) -> Self {
        self.aad = aad;
        self
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn aad(&self) -> &ChunkAad {
        &self.aad
    }

    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// A codec borrowing this one's cipher.
    pub fn by_ref(&self) -> ChunkCodec<&C> {
        ChunkCodec {
            cipher: &self.cipher,
            layout: self.layout,
            aad: self.aad.clone(),
        }
    }

    /// Seal one plaintext unit into `nonce ‖ ciphertext ‖ tag`.
    ///
    /// # Errors
    ///
    /// `ChunkTooLarge` if `plaintext` exceeds the chunk capacity, `Encryption`
    /// if the cipher fails.
    pub fn encrypt_chunk(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, StreamError> {
        let maximum = self.layout.plaintext_chunk_size();
        if plaintext.len() > maximum {
            return Err(StreamError::ChunkTooLarge {
                actual: plaintext.len(),
                maximum,
            });
        }

        let context = StreamContext::new().with_operation("encrypt_chunk");

        let mut nonce = vec![0u8; self.layout.nonce_size()];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .seal(&nonce, plaintext, aad)
            .map_err(|e| StreamError::Encryption {
                reason: e.to_string(),
                context: context.clone(),
            })?;

        if sealed.len() != plaintext.len() + self.layout.tag_size() {
            return Err(StreamError::Encryption {
                reason: format!(
                    "cipher produced {} bytes for {} bytes of plaintext",
                    sealed.len(),
                    plaintext.len()
                ),
                context,
            });
        }

        let mut chunk = Vec::with_capacity(nonce.len() + sealed.len());
        chunk.extend_from_slice(&nonce);
        chunk.extend_from_slice(&sealed);
        Ok(chunk)
    }

    /// Open one `nonce ‖ ciphertext ‖ tag` chunk.
    ///
    /// # Errors
    ///
    /// `MalformedChunk` if the chunk cannot hold a nonce and tag,
    /// `Authentication` if the tag does not verify.
    pub fn decrypt_chunk(
        &self,
        chunk: &[u8],
        aad: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, StreamError> {
        let context = StreamContext::new().with_operation("decrypt_chunk");

        let minimum = self.layout.overhead();
        if chunk.len() < minimum {
            return Err(StreamError::MalformedChunk {
                actual: chunk.len(),
                minimum,
                context,
            });
        }

        let (nonce, ciphertext_and_tag) = chunk.split_at(self.layout.nonce_size());

        match self.cipher.open(nonce, ciphertext_and_tag, aad) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(CipherError::Open) => Err(StreamError::Authentication { context }),
            Err(e @ CipherError::NonceLength { .. }) => Err(StreamError::InvalidLayout {
                reason: e.to_string(),
            }),
            Err(e @ CipherError::Seal(_)) => Err(StreamError::Encryption {
                reason: e.to_string(),
                context,
            }),
        }
    }

    /// Seal chunk `chunk_index` with the codec's associated-data policy.
    pub fn encrypt_indexed(
        &self,
        chunk_index: u64,
        is_final: bool,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, StreamError> {
        let aad = self.aad.for_chunk(chunk_index, is_final);
        self.encrypt_chunk(plaintext, &aad)
            .map_err(|e| e.with_context(&StreamContext::new().with_chunk(chunk_index)))
    }

    /// Open chunk `chunk_index` with the codec's associated-data policy.
    pub fn decrypt_indexed(
        &self,
        chunk_index: u64,
        is_final: bool,
        chunk: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, StreamError> {
        let aad = self.aad.for_chunk(chunk_index, is_final);
        self.decrypt_chunk(chunk, &aad).map_err(|e| {
            if matches!(e, StreamError::Authentication { .. }) {
                warn!(
                    chunk = chunk_index,
                    is_final, "Chunk decryption failed - authentication tag mismatch"
                );
            }
            e.with_context(&StreamContext::new().with_chunk(chunk_index))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherKind, CipherSuite, ContentKey};

    fn codec() -> ChunkCodec<CipherSuite> {
        ChunkCodec::new(CipherKind::Aes256Gcm.build(&ContentKey::random())).unwrap()
    }

    #[test]
    fn test_chunk_layout_on_disk() {
        let codec = codec();
        let chunk = codec.encrypt_chunk(b"hello", b"").unwrap();
        assert_eq!(chunk.len(), 12 + 5 + 16);
        assert_eq!(&*codec.decrypt_chunk(&chunk, b"").unwrap(), b"hello");
    }

    #[test]
    fn test_nonce_uniqueness() {
        let codec = codec();
        let plaintext = vec![0x5A; 1024];

        let a = codec.encrypt_chunk(&plaintext, b"").unwrap();
        let b = codec.encrypt_chunk(&plaintext, b"").unwrap();

        assert_ne!(a[..12], b[..12], "nonces must differ");
        assert_ne!(a[12..], b[12..], "ciphertexts must differ");
    }

    #[test]
    fn test_empty_plaintext_chunk() {
        let codec = codec();
        let chunk = codec.encrypt_chunk(b"", b"").unwrap();
        assert_eq!(chunk.len(), 28);
        assert!(codec.decrypt_chunk(&chunk, b"").unwrap().is_empty());
    }

    #[test]
    fn test_full_chunk() {
        let codec = codec();
        let plaintext = vec![7u8; DEFAULT_CHUNK_PLAINTEXT_SIZE];
        let chunk = codec.encrypt_chunk(&plaintext, b"").unwrap();
        assert_eq!(chunk.len(), 65564);
    }

    #[test]
    fn test_chunk_too_large() {
        let codec = codec();
        let plaintext = vec![0u8; DEFAULT_CHUNK_PLAINTEXT_SIZE + 1];
        assert!(matches!(
            codec.encrypt_chunk(&plaintext, b""),
            Err(StreamError::ChunkTooLarge {
                actual: 65537,
                maximum: 65536
            })
        ));
    }

    #[test]
    fn test_malformed_chunk() {
        let codec = codec();
        let result = codec.decrypt_chunk(&[0u8; 27], b"");
        assert!(matches!(
            result,
            Err(StreamError::MalformedChunk {
                actual: 27,
                minimum: 28,
                ..
            })
        ));
    }

    #[test]
    fn test_every_region_is_authenticated() {
        let codec = codec();
        let chunk = codec.encrypt_chunk(b"sixteen byte msg", b"").unwrap();

        // nonce, ciphertext, tag
        for index in [0, 11, 12, 20, chunk.len() - 16, chunk.len() - 1] {
            let mut tampered = chunk.clone();
            tampered[index] ^= 0x01;
            let result = codec.decrypt_chunk(&tampered, b"");
            assert!(
                matches!(result, Err(StreamError::Authentication { .. })),
                "bit flip at {index} was not detected"
            );
        }
    }

    #[test]
    fn test_wrong_key() {
        let chunk = codec().encrypt_chunk(b"secret", b"").unwrap();
        let result = codec().decrypt_chunk(&chunk, b"");
        assert!(result.unwrap_err().is_integrity_violation());
    }

    #[test]
    fn test_aad_mismatch() {
        let codec = codec();
        let chunk = codec.encrypt_chunk(b"data", b"label-a").unwrap();
        assert!(matches!(
            codec.decrypt_chunk(&chunk, b"label-b"),
            Err(StreamError::Authentication { .. })
        ));
    }

    #[test]
    fn test_indexed_aad_encoding() {
        let aad = ChunkAad::Indexed(b"ctx".to_vec());
        let bytes = aad.for_chunk(258, true);
        assert_eq!(&*bytes, b"ctx\0\0\0\0\0\0\x01\x02\x01");
        assert_eq!(aad.for_chunk(0, false).last(), Some(&0));
        assert!(aad.is_positional());

        assert!(ChunkAad::None.for_chunk(5, true).is_empty());
        assert_eq!(&*ChunkAad::Fixed(b"L".to_vec()).for_chunk(5, true), b"L");
    }

    #[test]
    fn test_indexed_chunks_cannot_move() {
        let codec = codec().with_aad(ChunkAad::Indexed(b"file-1".to_vec()));
        let chunk = codec.encrypt_indexed(3, false, b"payload").unwrap();

        assert!(codec.decrypt_indexed(3, false, &chunk).is_ok());

        let moved = codec.decrypt_indexed(4, false, &chunk).unwrap_err();
        assert!(matches!(moved, StreamError::Authentication { .. }));
        assert_eq!(moved.context().and_then(|c| c.chunk_index), Some(4));

        assert!(codec.decrypt_indexed(3, true, &chunk).is_err());
    }

    #[test]
    fn test_custom_chunk_size() {
        let sized = codec().with_chunk_size(4096).unwrap();
        assert_eq!(sized.layout().encrypted_chunk_size(), 4124);
        assert!(sized.encrypt_chunk(&[0u8; 4097], b"").is_err());
        assert!(codec().with_chunk_size(0).is_err());
    }

    #[test]
    fn test_by_ref_shares_cipher() {
        let codec = codec().with_aad(ChunkAad::Fixed(b"app".to_vec()));
        let borrowed = codec.by_ref();
        let chunk = borrowed.encrypt_indexed(0, true, b"x").unwrap();
        assert_eq!(&*codec.decrypt_indexed(0, true, &chunk).unwrap(), b"x");
    }
}
