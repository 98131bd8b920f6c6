//! Ensure command for the wintc CLI.
//!
//! Makes the toolchain with the given content hash available, records it as
//! the active one and cleans up versions nobody uses anymore.
//!
//! ## Usage
//!
//! ```bash
//! wintc ensure 4087e065abebdca6dbd0caca2910c6718d2ec67f
//! wintc ensure <hash> --output-json out/win_toolchain.json
//! ```
//!
//! ## Process
//!
//! 1. Skip silently on non-Windows hosts unless `--force`
//! 2. Acquire the hash (download, extract, verify) if it is missing
//! 3. Write `data.json` and mark the version as used
//! 4. Evict orphaned and expired versions

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, warn};

use super::gc::print_report;
use crate::config::{Config, VsVersion};
use crate::toolchain::cache::InstallState;
use crate::toolchain::platform::{PlatformProbe, ucrt_installer_name};
use crate::toolchain::{
    AcquireOutcome, CachePaths, EvictionPolicy, Platform, RegistryProbe, SystemProbes,
    ToolchainCache, ToolchainInfo, evict_unused, source,
};

/// Arguments for the ensure command.
#[derive(Args)]
pub struct EnsureArgs {
    /// Content hash of the toolchain to install.
    pub hash: String,

    /// Also copy the combined info to this file.
    #[arg(long, value_name = "FILE")]
    pub output_json: Option<PathBuf>,

    /// Run even when the host is not Windows.
    #[arg(long)]
    pub force: bool,
}

/// Executes the ensure command.
///
/// # Errors
///
/// Returns an error if access is missing, the download or extraction fails,
/// the installed toolchain does not hash to the requested value, or the info
/// file cannot be written.
pub fn execute(args: &EnsureArgs, config: &Config) -> Result<()> {
    let platform = Platform::detect();
    if !platform.is_windows() && !args.force {
        debug!(%platform, "not a Windows host, nothing to do");
        return Ok(());
    }

    let cache = ToolchainCache::new(CachePaths::from_config(config));
    let source = source::from_config(config);
    let probes = SystemProbes::from_config(config);
    let hash = args.hash.as_str();

    let outcome = cache.acquire(hash, source.as_ref(), &probes, &mut |state: &InstallState| {
        println!("{state}");
    })?;
    if outcome == AcquireOutcome::AlreadyInstalled {
        println!("Toolchain {hash} is up to date.");
    }

    let info = ToolchainInfo::resolve(&cache.paths().version_dir(hash))?;
    cache.record_use(hash)?;
    info.write(&cache.paths().info_file())?;

    if let Some(output) = &args.output_json {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::copy(cache.paths().info_file(), output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    if config.vs_version == VsVersion::Vs2015 {
        note_universal_crt(&RegistryProbe);
    }

    let policy = EvictionPolicy::from_config(config);
    let report = evict_unused(&cache, &policy, std::time::SystemTime::now())?;
    print_report(&report, false);
    for error in &report.errors {
        warn!(%error, "failed to remove unused toolchain");
    }

    Ok(())
}

/// Points at the Universal CRT update VS2015 binaries need on older Windows.
fn note_universal_crt(probe: &dyn PlatformProbe) {
    if let Some(release) = probe.windows_release()
        && let Some(installer) = ucrt_installer_name(&release)
    {
        println!(
            "Note: {release} needs the Universal CRT update ({installer}) to run VS2015 binaries."
        );
    }
}
