//! List command for the wintc CLI.
//!
//! ## Output Format
//!
//! ```text
//! Installed toolchains in /home/user/.wintc/vs_files:
//!
//! * 4087e065abebdca6dbd0caca2910c6718d2ec67f    (verified, last used today)
//!   95ddda401ec5678f15eeed01d2bee08fcbc5ee97    (no sidecar, last used 2 months ago)
//! ```
//!
//! The asterisk marks the toolchain recorded in `data.json`.

use std::time::SystemTime;

use anyhow::Result;

use crate::config::Config;
use crate::toolchain::paths::format_age;
use crate::toolchain::{CachePaths, ToolchainCache, ToolchainInfo};

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the cache root cannot be read.
pub fn execute(config: &Config) -> Result<()> {
    let cache = ToolchainCache::new(CachePaths::from_config(config));
    let paths = cache.paths();
    let names = paths.list_version_dirs()?;

    if names.is_empty() {
        println!("No toolchains installed.");
        println!();
        println!("Run 'wintc ensure <hash>' to install one.");
        return Ok(());
    }

    let active = ToolchainInfo::read(&paths.info_file())
        .ok()
        .flatten()
        .and_then(|info| info.version_name());
    let now = SystemTime::now();

    println!("Installed toolchains in {}:", paths.cache_root.display());
    println!();

    for name in &names {
        let mut info_parts = Vec::new();
        match cache.sidecar_state(name) {
            Ok(state) => info_parts.push(state.to_string()),
            Err(e) => info_parts.push(format!("unreadable: {e}")),
        }
        if let Some(used) = paths.last_used(name) {
            info_parts.push(format!("last used {}", format_age(used, now)));
        }

        let marker = if active.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name}    ({})", info_parts.join(", "));
    }

    Ok(())
}
