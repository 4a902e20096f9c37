//! Transparent random-access encryption for seekable byte streams.
//!
//! A plaintext stream is stored as a sequence of independently authenticated
//! AEAD chunks. [`fs::DecryptingStream`] reads such a container at arbitrary
//! offsets while decrypting only the chunks a read touches, and the
//! [`fs::transform`] helpers convert whole files in either direction.

pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;

pub use config::{AadConfig, AadMode, CodecConfig};
pub use crypto::{AeadCipher, CipherKind, CipherSuite, ContentKey};
pub use error::{StreamContext, StreamError};
pub use fs::{ChunkAad, ChunkCodec, ChunkLayout, DecryptingStream, EncryptingWriter};
