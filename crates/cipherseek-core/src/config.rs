//! Serializable codec configuration.
//!
//! Everything needed to rebuild a [`ChunkCodec`] except the key. Readers and
//! writers of the same container must agree on all of it.
//!
//! ```toml
//! cipher = "aes-256-gcm"
//! chunk_size = 65536
//! cache_chunks = 4
//!
//! [aad]
//! mode = "indexed"
//! context = "media-library"
//! ```

use serde::{Deserialize, Serialize};

use crate::crypto::{CipherKind, CipherSuite, ContentKey};
use crate::error::StreamError;
use crate::fs::layout::DEFAULT_CHUNK_PLAINTEXT_SIZE;
use crate::fs::{ChunkAad, ChunkCodec, StreamOptions};

/// How associated data is derived for each chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AadMode {
    #[default]
    None,
    Fixed,
    Indexed,
}

impl AadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AadMode::None => "none",
            AadMode::Fixed => "fixed",
            AadMode::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AadConfig {
    pub mode: AadMode,
    /// Context bytes (UTF-8) for `fixed` and `indexed` modes.
    pub context: String,
}

impl AadConfig {
    pub fn to_chunk_aad(&self) -> ChunkAad {
        let context = self.context.as_bytes().to_vec();
        match self.mode {
            AadMode::None => ChunkAad::None,
            AadMode::Fixed => ChunkAad::Fixed(context),
            AadMode::Indexed => ChunkAad::Indexed(context),
        }
    }
}

/// Codec parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub cipher: CipherKind,
    /// Plaintext bytes per chunk.
    pub chunk_size: usize,
    pub aad: AadConfig,
    /// Decrypted chunks kept resident by each stream.
    pub cache_chunks: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            cipher: CipherKind::default(),
            chunk_size: DEFAULT_CHUNK_PLAINTEXT_SIZE,
            aad: AadConfig::default(),
            cache_chunks: StreamOptions::default().cache_chunks,
        }
    }
}

impl CodecConfig {
    /// Build a codec bound to `key`.
    ///
    /// # Errors
    ///
    /// `InvalidLayout` if `chunk_size` is zero.
    pub fn build_codec(&self, key: &ContentKey) -> Result<ChunkCodec<CipherSuite>, StreamError> {
        Ok(ChunkCodec::new(self.cipher.build(key))?
            .with_chunk_size(self.chunk_size)?
            .with_aad(self.aad.to_chunk_aad()))
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            cache_chunks: self.cache_chunks,
        }
    }
}
