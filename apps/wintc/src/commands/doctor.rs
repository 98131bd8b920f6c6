//! Doctor command for the wintc CLI.
//!
//! Reports the health of the toolchain cache and the ways of reaching the
//! archive store. See [`crate::toolchain::doctor`] for the individual checks.

use anyhow::Result;

use crate::config::Config;
use crate::toolchain::doctor::{DoctorCheckStatus, run_all_checks};
use crate::toolchain::{CachePaths, RegistryProbe, ToolchainCache, source};

/// Executes the doctor command.
///
/// # Errors
///
/// Never fails on check results; failing checks are only reported.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(config: &Config) -> Result<()> {
    println!(
        "wintc {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("WINTC_GIT_COMMIT")
    );
    println!("Checking toolchain cache (VS {})...", config.vs_version);
    println!();

    let cache = ToolchainCache::new(CachePaths::from_config(config));
    let source = source::from_config(config);
    let checks = run_all_checks(config, &cache, source.as_ref(), &RegistryProbe);

    let mut has_errors = false;
    let mut has_warnings = false;
    for check in &checks {
        println!("  {} {}: {}", check.prefix(), check.name, check.message);
        match check.status {
            DoctorCheckStatus::Ok => {}
            DoctorCheckStatus::Warning => has_warnings = true,
            DoctorCheckStatus::Error => has_errors = true,
        }
    }

    println!();
    if has_errors {
        println!("Some checks failed.");
    } else if has_warnings {
        println!("All checks passed with warnings.");
    } else {
        println!("All checks passed.");
    }

    Ok(())
}
