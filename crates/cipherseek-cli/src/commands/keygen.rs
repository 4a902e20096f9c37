//! Keygen command - create a random 256-bit content key.
//!
//! # Examples
//!
//! ```bash
//! # Print a key to stdout
//! cipherseek keygen
//!
//! # Write a key file readable only by the owner
//! cipherseek keygen --output media.key
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use cipherseek_core::crypto::ContentKey;

#[derive(ClapArgs)]
pub struct Args {
    /// Write the key to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing key file
    #[arg(long, requires = "output")]
    pub force: bool,
}

#[instrument(level = "info", name = "cmd::keygen", skip_all)]
pub fn execute(args: &Args) -> Result<()> {
    let key = ContentKey::random();
    let encoded = key.to_hex();

    match args.output {
        Some(ref path) => {
            write_key_file(path, &encoded, args.force)?;
            info!(path = %path.display(), "Key written");
        }
        None => println!("{}", encoded.as_str()),
    }

    Ok(())
}

fn write_key_file(path: &Path, encoded: &str, force: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).with_context(|| {
        format!(
            "Failed to create key file {} (use --force to overwrite)",
            path.display()
        )
    })?;
    writeln!(file, "{encoded}")
        .with_context(|| format!("Failed to write key file {}", path.display()))?;
    Ok(())
}
