use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use cipherseek_core::config::CodecConfig;
use cipherseek_core::crypto::ContentKey;
use cipherseek_core::error::StreamContext;
use cipherseek_core::fs::DecryptingStream;

/// Bytes requested from the stream per write to stdout
const READ_SIZE: usize = 64 * 1024;

#[derive(ClapArgs)]
pub struct Args {
    /// Encrypted container
    pub file: PathBuf,

    /// Decrypted offset to start at
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Maximum number of bytes to output (default: to the end)
    #[arg(long)]
    pub length: Option<u64>,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(file = %args.file.display(), offset = args.offset))]
pub fn execute(args: &Args, config: &CodecConfig, key: &ContentKey) -> Result<()> {
    let codec = config.build_codec(key)?;
    let context = StreamContext::new().with_path(&args.file);

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let mut stream = DecryptingStream::open_with(file, codec, config.stream_options())
        .map_err(|e| e.with_context(&context))?
        .with_context(context);

    stream.seek_to(args.offset)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut remaining = args.length.unwrap_or(u64::MAX);

    while remaining > 0 && !stream.is_eof() {
        let want = usize::try_from(remaining).map_or(READ_SIZE, |r| r.min(READ_SIZE));
        let data = stream.read_up_to(want)?;
        if data.is_empty() {
            break;
        }
        out.write_all(&data)?;
        remaining -= data.len() as u64;
    }

    out.flush()?;
    stream.close()?;
    Ok(())
}
