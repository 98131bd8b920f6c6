//! Remove command for the wintc CLI.
//!
//! ## Usage
//!
//! ```bash
//! wintc remove <hash>
//! ```

use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::errors::WintcError;
use crate::toolchain::{CachePaths, EvictionPolicy, remove_version};

/// Arguments for the remove command.
#[derive(Args)]
pub struct RemoveArgs {
    /// Hash of the toolchain to remove.
    pub hash: String,
}

/// Executes the remove command.
///
/// A countdown precedes removal unless running headless.
///
/// # Errors
///
/// Returns an error if the toolchain is not installed or cannot be removed.
pub fn execute(args: &RemoveArgs, config: &Config) -> Result<()> {
    let paths = CachePaths::from_config(config);
    let hash = &args.hash;

    if !paths.is_installed(hash) {
        return Err(WintcError::not_installed(hash).into());
    }

    println!("Removing toolchain {hash}...");
    let delay = EvictionPolicy::from_config(config).removal_delay();
    remove_version(&paths, hash, delay)?;
    println!("Toolchain {hash} removed.");

    Ok(())
}
