//! Garbage-collection command for the wintc CLI.
//!
//! ## Usage
//!
//! ```bash
//! wintc gc             # Remove orphaned, stray and expired toolchains
//! wintc gc --dry-run   # Only report what would be removed
//! ```

use std::time::SystemTime;

use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::toolchain::gc::{EvictionReason, EvictionReport};
use crate::toolchain::{CachePaths, EvictionPolicy, ToolchainCache, evict_unused};

/// Arguments for the gc command.
#[derive(Args)]
pub struct GcArgs {
    /// Report what would be removed without deleting anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the gc command.
///
/// # Errors
///
/// Returns an error if the cache root cannot be read. Individual removal
/// failures are reported but do not fail the command.
pub fn execute(args: &GcArgs, config: &Config) -> Result<()> {
    let cache = ToolchainCache::new(CachePaths::from_config(config));
    let mut policy = EvictionPolicy::from_config(config);
    if args.dry_run {
        policy = policy.with_dry_run();
    }

    let report = evict_unused(&cache, &policy, SystemTime::now())?;

    if report.evicted.is_empty() {
        println!("Nothing to clean up ({} entries checked).", report.scanned);
    } else {
        print_report(&report, args.dry_run);
    }
    for error in &report.errors {
        println!("  [FAIL] {error}");
    }
    if !report.kept.is_empty() {
        println!("Kept {} toolchain(s): {}", report.kept.len(), report.kept.join(", "));
    }

    Ok(())
}

/// Prints one line per evicted entry.
pub fn print_report(report: &EvictionReport, dry_run: bool) {
    let verb = if dry_run { "Would remove" } else { "Removed" };
    for eviction in &report.evicted {
        let why = match &eviction.reason {
            EvictionReason::Orphaned => "orphaned toolchain".to_string(),
            EvictionReason::StrayFile => "stray file".to_string(),
            EvictionReason::Expired { unused_days } => {
                format!("toolchain unused for {unused_days} days")
            }
        };
        println!("{verb} {why} {}", eviction.name);
    }
}
