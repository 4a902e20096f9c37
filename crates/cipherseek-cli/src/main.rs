#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use cipherseek_core::crypto::ContentKey;
use cipherseek_core::crypto::keys::KeyError;
use cipherseek_core::error::StreamError;

use crate::commands::{cat, decrypt, encrypt, info, keygen};
use crate::config::{CodecArgs, Config};

/// Chunked AEAD file encryption with random-access reads
#[derive(Parser)]
#[command(name = "cipherseek")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Create a key
    cipherseek keygen --output media.key

    # Encrypt and decrypt whole files
    cipherseek --key-file media.key encrypt movie.mkv movie.mkv.enc
    cipherseek --key-file media.key decrypt movie.mkv.enc movie.mkv

    # Read 1 MiB starting at byte 4096 without decrypting the rest
    cipherseek --key-file media.key cat movie.mkv.enc --offset 4096 --length 1048576

    # Inspect a container
    cipherseek info movie.mkv.enc --json
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// File holding the hex-encoded 256-bit key
    #[arg(long, value_name = "PATH", global = true)]
    key_file: Option<PathBuf>,

    /// Hex-encoded key (insecure, prefer --key-file)
    #[arg(long, env = "CIPHERSEEK_KEY", hide_env_values = true, global = true)]
    key: Option<String>,

    #[command(flatten)]
    codec: CodecArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new random key
    Keygen(keygen::Args),

    /// Encrypt a file into a chunked container
    Encrypt(encrypt::Args),

    /// Decrypt a whole container
    Decrypt(decrypt::Args),

    /// Decrypt and output a byte range of a container
    Cat(cat::Args),

    /// Show container geometry
    Info(info::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            let args: Vec<String> = std::env::args().collect();
            let is_quiet = args.iter().any(|a| a == "-q" || a == "--quiet");

            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let config = Config::load()?;
    let codec_config = cli.codec.apply(config.codec.clone());
    tracing::debug!(?codec_config, "Resolved codec configuration");

    match &cli.command {
        Commands::Keygen(args) => keygen::execute(args),
        Commands::Encrypt(args) => {
            let key = load_key(&cli, &config)?;
            encrypt::execute(args, &codec_config, &key, cli.quiet)
        }
        Commands::Decrypt(args) => {
            let key = load_key(&cli, &config)?;
            decrypt::execute(args, &codec_config, &key, cli.quiet)
        }
        Commands::Cat(args) => {
            let key = load_key(&cli, &config)?;
            cat::execute(args, &codec_config, &key)
        }
        Commands::Info(args) => {
            let key = if args.verify {
                Some(load_key(&cli, &config)?)
            } else {
                None
            };
            info::execute(args, &codec_config, key.as_ref())
        }
    }
}

/// Resolve the content key: `--key-file`, then `--key`/`CIPHERSEEK_KEY`,
/// then `key_file` from the config file.
fn load_key(cli: &Cli, config: &Config) -> Result<ContentKey> {
    let key_file = cli.key_file.as_ref().or(if cli.key.is_some() {
        None
    } else {
        config.key_file.as_ref()
    });

    if let Some(path) = key_file {
        let encoded = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read key file: {}", path.display()))?,
        );
        return ContentKey::from_hex(&encoded)
            .with_context(|| format!("Invalid key in {}", path.display()));
    }

    match cli.key {
        Some(ref encoded) => ContentKey::from_hex(encoded).context("Invalid key"),
        None => Err(anyhow::anyhow!(
            "No key supplied: use --key-file, --key or CIPHERSEEK_KEY"
        )),
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(stream_err) = cause.downcast_ref::<StreamError>()
            && let Some(code) = categorize_stream_error(stream_err)
        {
            return code;
        }

        if cause.downcast_ref::<KeyError>().is_some() {
            return exit_code::USAGE_ERROR;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            // `std::io::Read` on a stream wraps the typed error
            if let Some(stream_err) = io_err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<StreamError>())
                && let Some(code) = categorize_stream_error(stream_err)
            {
                return code;
            }
            if io_err.kind() == io::ErrorKind::NotFound {
                return exit_code::NOT_FOUND;
            }
        }
    }

    let msg = format!("{e:#}").to_lowercase();
    if msg.contains("no key supplied") {
        exit_code::USAGE_ERROR
    } else {
        exit_code::GENERAL_ERROR
    }
}

fn categorize_stream_error(err: &StreamError) -> Option<u8> {
    if err.is_integrity_violation() {
        return Some(exit_code::INTEGRITY_FAILED);
    }
    match err {
        StreamError::OutOfRange { .. } => Some(exit_code::OUT_OF_RANGE),
        StreamError::InvalidLayout { .. } | StreamError::ChunkTooLarge { .. } => {
            Some(exit_code::USAGE_ERROR)
        }
        StreamError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            Some(exit_code::NOT_FOUND)
        }
        _ => None,
    }
}
