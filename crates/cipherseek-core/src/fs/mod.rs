//! Chunked container encoding, random-access decryption and batch transforms

pub mod codec;
pub mod layout;
pub mod source;
pub mod stream;
pub mod transform;
pub mod writer;

// Re-export commonly used types
pub use codec::{ChunkAad, ChunkCodec};
pub use layout::{
    CHUNK_OVERHEAD, ChunkLayout, ChunkPosition, ChunkSide, DEFAULT_CHUNK_ENCRYPTED_SIZE,
    DEFAULT_CHUNK_PLAINTEXT_SIZE, NONCE_SIZE, TAG_SIZE,
};
pub use source::ByteSource;
pub use stream::{DecryptingStream, StreamOptions};
pub use transform::{
    TransformStats, decrypt_bytes, decrypt_file, decrypt_stream, encrypt_bytes, encrypt_file,
    encrypt_stream,
};
pub use writer::EncryptingWriter;
