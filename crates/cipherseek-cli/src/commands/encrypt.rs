//! Encrypt command - seal a plaintext file into a chunked container.
//!
//! File-to-file encryption writes a temporary sibling and renames it into
//! place, so an interrupted run never leaves a partial container behind.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use cipherseek_core::config::CodecConfig;
use cipherseek_core::crypto::ContentKey;
use cipherseek_core::fs::{encrypt_file, encrypt_stream};

use super::is_stdio;
use crate::output::format_size;

#[derive(ClapArgs)]
pub struct Args {
    /// Plaintext input file ("-" for stdin)
    #[arg(value_name = "IN")]
    pub input: PathBuf,

    /// Container output file ("-" for stdout)
    #[arg(value_name = "OUT")]
    pub output: PathBuf,
}

#[instrument(level = "info", name = "cmd::encrypt", skip_all, fields(input = %args.input.display(), output = %args.output.display()))]
pub fn execute(args: &Args, config: &CodecConfig, key: &ContentKey, quiet: bool) -> Result<()> {
    let codec = config.build_codec(key)?;

    let stats = if is_stdio(&args.output) {
        let stdout = io::stdout();
        if is_stdio(&args.input) {
            encrypt_stream(io::stdin().lock(), stdout.lock(), &codec)?
        } else {
            let source = File::open(&args.input)
                .with_context(|| format!("Failed to open {}", args.input.display()))?;
            encrypt_stream(source, stdout.lock(), &codec)?
        }
    } else if is_stdio(&args.input) {
        let sink = File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
        encrypt_stream(io::stdin().lock(), BufWriter::new(sink), &codec)?
    } else {
        encrypt_file(&args.input, &args.output, &codec)
            .with_context(|| format!("Failed to encrypt {}", args.input.display()))?
    };

    if !quiet {
        eprintln!(
            "Encrypted {} into {} chunk(s), {} on disk",
            format_size(stats.plaintext_bytes),
            stats.chunks,
            format_size(stats.ciphertext_bytes)
        );
    }
    Ok(())
}
