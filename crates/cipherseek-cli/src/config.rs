//! Configuration file support for the cipherseek CLI.
//!
//! Configuration is read from `config.toml` in the platform config directory
//! (`~/.config/cipherseek/` on Linux), or from `$CIPHERSEEK_CONFIG_DIR` when
//! set. Command-line flags override file values.
//!
//! # Example configuration
//!
//! ```toml
//! key_file = "/home/user/.keys/media.key"
//!
//! [codec]
//! cipher = "chacha20-poly1305"
//! chunk_size = 65536
//! cache_chunks = 4
//!
//! [codec.aad]
//! mode = "indexed"
//! context = "media-library"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, ValueEnum};
use serde::{Deserialize, Serialize};

use cipherseek_core::config::{AadMode, CodecConfig};
use cipherseek_core::crypto::CipherKind;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "CIPHERSEEK_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Default key file used when no key is given on the command line
    pub key_file: Option<PathBuf>,

    /// Codec parameters shared by every command
    #[serde(default)]
    pub codec: CodecConfig,
}

impl Config {
    /// Load configuration from the default path, or return empty config if not found.
    pub fn load() -> Result<Self> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Get the path to the configuration file.
pub fn config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir).join(CONFIG_FILE));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(base_dirs.config_dir().join("cipherseek").join(CONFIG_FILE))
}

/// Associated-data policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AadModeArg {
    /// No associated data
    None,
    /// Same context bytes for every chunk
    Fixed,
    /// Context bytes plus chunk index and final-chunk flag
    Indexed,
}

impl From<AadModeArg> for AadMode {
    fn from(arg: AadModeArg) -> Self {
        match arg {
            AadModeArg::None => AadMode::None,
            AadModeArg::Fixed => AadMode::Fixed,
            AadModeArg::Indexed => AadMode::Indexed,
        }
    }
}

/// Codec flags, each overriding the matching config file value
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct CodecArgs {
    /// AEAD cipher (aes-256-gcm, chacha20-poly1305)
    #[arg(long, value_name = "CIPHER", global = true)]
    pub cipher: Option<CipherKind>,

    /// Plaintext bytes per chunk
    #[arg(long, value_name = "BYTES", global = true)]
    pub chunk_size: Option<usize>,

    /// Associated data bound to each chunk
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    pub aad_mode: Option<AadModeArg>,

    /// Context string for fixed and indexed associated data
    #[arg(long, value_name = "TEXT", global = true)]
    pub aad_context: Option<String>,

    /// Decrypted chunks kept in memory for random-access reads
    #[arg(long, value_name = "N", global = true)]
    pub cache_chunks: Option<usize>,
}

impl CodecArgs {
    /// Apply the flags that were given on top of `base`.
    pub fn apply(&self, mut base: CodecConfig) -> CodecConfig {
        if let Some(cipher) = self.cipher {
            base.cipher = cipher;
        }
        if let Some(chunk_size) = self.chunk_size {
            base.chunk_size = chunk_size;
        }
        if let Some(mode) = self.aad_mode {
            base.aad.mode = mode.into();
        }
        if let Some(ref context) = self.aad_context {
            base.aad.context.clone_from(context);
        }
        if let Some(cache_chunks) = self.cache_chunks {
            base.cache_chunks = cache_chunks;
        }
        base
    }
}
