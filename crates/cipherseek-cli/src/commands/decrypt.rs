//! Decrypt command - authenticate and decrypt a whole container.
//!
//! A container that fails authentication leaves the destination file
//! untouched. When writing to stdout, output stops at the first bad chunk and
//! the command exits with the integrity failure code.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;
use tracing::instrument;

use cipherseek_core::config::CodecConfig;
use cipherseek_core::crypto::ContentKey;
use cipherseek_core::error::StreamContext;
use cipherseek_core::fs::{decrypt_file, decrypt_stream};

use super::is_stdio;
use crate::output::format_size;

#[derive(ClapArgs)]
pub struct Args {
    /// Container input file
    #[arg(value_name = "IN")]
    pub input: PathBuf,

    /// Plaintext output file ("-" for stdout)
    #[arg(value_name = "OUT")]
    pub output: PathBuf,
}

#[instrument(level = "info", name = "cmd::decrypt", skip_all, fields(input = %args.input.display(), output = %args.output.display()))]
pub fn execute(args: &Args, config: &CodecConfig, key: &ContentKey, quiet: bool) -> Result<()> {
    if is_stdio(&args.input) {
        bail!("decrypt needs a seekable input file, not stdin");
    }

    let codec = config.build_codec(key)?;

    let stats = if is_stdio(&args.output) {
        let source = File::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        decrypt_stream(source, io::stdout().lock(), &codec)
            .map_err(|e| e.with_context(&StreamContext::new().with_path(&args.input)))?
    } else {
        decrypt_file(&args.input, &args.output, &codec)?
    };

    if !quiet {
        eprintln!(
            "Decrypted {} from {} chunk(s)",
            format_size(stats.plaintext_bytes),
            stats.chunks
        );
    }
    Ok(())
}
