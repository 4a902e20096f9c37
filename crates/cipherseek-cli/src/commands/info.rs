//! Info command - show the geometry of a container.
//!
//! Geometry comes from the file length alone, so no key is needed unless
//! `--verify` is given.
//!
//! # Examples
//!
//! ```bash
//! cipherseek info movie.mkv.enc
//! cipherseek info movie.mkv.enc --json
//! cipherseek --key-file media.key info movie.mkv.enc --verify
//! ```

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use cipherseek_core::config::CodecConfig;
use cipherseek_core::crypto::ContentKey;
use cipherseek_core::error::StreamContext;
use cipherseek_core::fs::{ChunkLayout, NONCE_SIZE, TAG_SIZE, decrypt_stream};

use crate::output::{create_table, format_size};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Encrypted container
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Authenticate every chunk (requires the key)
    #[arg(long)]
    pub verify: bool,
}

/// JSON output format for info command
#[derive(Serialize)]
struct ContainerInfo {
    path: String,
    cipher: String,
    aad_mode: String,
    chunk_size: usize,
    encrypted_chunk_size: usize,
    encrypted_size: u64,
    plaintext_size: u64,
    chunk_count: u64,
    final_chunk_plaintext: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified: Option<bool>,
}

#[instrument(level = "info", name = "cmd::info", skip_all, fields(file = %args.file.display()))]
pub fn execute(args: &Args, config: &CodecConfig, key: Option<&ContentKey>) -> Result<()> {
    let context = StreamContext::new().with_path(&args.file);

    // Both supported ciphers use 96-bit nonces and 128-bit tags.
    let layout = ChunkLayout::new(config.chunk_size, NONCE_SIZE, TAG_SIZE)?;

    let encrypted_size = std::fs::metadata(&args.file)
        .with_context(|| format!("Failed to stat {}", args.file.display()))?
        .len();
    let plaintext_size = layout
        .plaintext_size(encrypted_size)
        .map_err(|e| e.with_context(&context))?;
    let chunk_count = layout.chunk_count(encrypted_size);
    let final_chunk_plaintext = match chunk_count {
        0 => 0,
        n => plaintext_size - layout.chunk_to_decrypted_offset(n - 1),
    };

    let verified = match key {
        Some(key) => {
            let codec = config.build_codec(key)?;
            let source = File::open(&args.file)
                .with_context(|| format!("Failed to open {}", args.file.display()))?;
            decrypt_stream(source, io::sink(), &codec).map_err(|e| e.with_context(&context))?;
            Some(true)
        }
        None => None,
    };

    let info = ContainerInfo {
        path: args.file.display().to_string(),
        cipher: config.cipher.to_string(),
        aad_mode: config.aad.mode.as_str().to_string(),
        chunk_size: layout.plaintext_chunk_size(),
        encrypted_chunk_size: layout.encrypted_chunk_size(),
        encrypted_size,
        plaintext_size,
        chunk_count,
        final_chunk_plaintext,
        verified,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Path", &info.path]);
        table.add_row(vec!["Cipher", &info.cipher]);
        table.add_row(vec!["AAD Mode", &info.aad_mode]);
        table.add_row(vec![
            "Chunk Size",
            &format!("{} ({} on disk)", info.chunk_size, info.encrypted_chunk_size),
        ]);
        table.add_row(vec![
            "Encrypted Size",
            &format!("{} ({})", info.encrypted_size, format_size(info.encrypted_size)),
        ]);
        table.add_row(vec![
            "Plaintext Size",
            &format!("{} ({})", info.plaintext_size, format_size(info.plaintext_size)),
        ]);
        table.add_row(vec!["Chunks", &info.chunk_count.to_string()]);
        table.add_row(vec![
            "Final Chunk",
            &format!("{} bytes", info.final_chunk_plaintext),
        ]);
        if let Some(verified) = info.verified {
            table.add_row(vec!["Verified", if verified { "yes" } else { "no" }]);
        }
        println!("{table}");
    }

    Ok(())
}
