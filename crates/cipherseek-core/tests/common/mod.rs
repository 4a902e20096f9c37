use cipherseek_core::crypto::{CipherKind, CipherSuite, ContentKey};
use cipherseek_core::fs::{ChunkCodec, DEFAULT_CHUNK_PLAINTEXT_SIZE};

/// Plaintext capacity of a default chunk, as `usize` for slicing.
pub const CHUNK: usize = DEFAULT_CHUNK_PLAINTEXT_SIZE;

/// Create a deterministic key for testing
pub fn create_test_key() -> ContentKey {
    ContentKey::from_bytes([0x01; 32])
}

/// Default-layout codec with a deterministic key
pub fn create_test_codec() -> ChunkCodec<CipherSuite> {
    ChunkCodec::new(CipherKind::Aes256Gcm.build(&create_test_key())).unwrap()
}

/// Codec with a small chunk size so multi-chunk cases stay cheap
#[allow(dead_code)] // Not every test binary uses small chunks
pub fn create_small_codec(chunk_size: usize) -> ChunkCodec<CipherSuite> {
    create_test_codec().with_chunk_size(chunk_size).unwrap()
}

/// Create content of exactly the specified size with a non-repeating-per-chunk pattern
pub fn create_sized_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}
