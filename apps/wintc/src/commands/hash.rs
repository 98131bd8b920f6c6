//! Hash command for the wintc CLI.
//!
//! Prints the content hash of an installed toolchain directory.
//!
//! ## Usage
//!
//! ```bash
//! wintc hash <name>          # Trust a valid sidecar
//! wintc hash <name> --full   # Always read every file
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::errors::WintcError;
use crate::toolchain::{CachePaths, ToolchainCache};

/// Arguments for the hash command.
#[derive(Args)]
pub struct HashArgs {
    /// Directory name of the installed toolchain.
    pub name: String,

    /// Ignore the sidecar and hash every file.
    #[arg(long)]
    pub full: bool,
}

/// Executes the hash command.
///
/// # Errors
///
/// Returns an error if the toolchain is not installed or cannot be read.
pub fn execute(args: &HashArgs, config: &Config) -> Result<()> {
    let cache = ToolchainCache::new(CachePaths::from_config(config));
    if !cache.paths().is_installed(&args.name) {
        return Err(WintcError::not_installed(&args.name).into());
    }

    let hash = if args.full {
        cache.compute_full_hash(&args.name)?
    } else {
        cache.compute_hash(&args.name)?
    };

    println!("{hash}");
    if hash != args.name {
        println!("Note: directory name {} does not match its content hash.", args.name);
        if !cache.needs_refresh(&args.name)? {
            println!("Another directory in the cache holds content hashing to {}.", args.name);
        }
    }
    Ok(())
}
