//! Health checks behind `wintc doctor`.
//!
//! ## Checks Performed
//!
//! - Host platform
//! - Cache root and installed versions
//! - Sidecar state of each version
//! - Active toolchain recorded in `data.json` still matches its hash
//! - Archive source availability (`gsutil`, mirror or local directory)
//! - Organisation identity
//! - Universal CRT update package for the Windows release

use super::cache::{SidecarState, ToolchainCache};
use super::info::ToolchainInfo;
use super::platform::{Platform, PlatformProbe, ucrt_installer_name};
use super::source::ArchiveSource;
use crate::config::Config;

/// Status of a doctor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorCheckStatus {
    Ok,
    Warning,
    Error,
}

/// Result of a single doctor check.
#[derive(Debug, Clone)]
pub struct DoctorCheck {
    pub name: String,
    pub status: DoctorCheckStatus,
    pub message: String,
}

impl DoctorCheck {
    #[must_use]
    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, DoctorCheckStatus::Ok, message)
    }

    #[must_use]
    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, DoctorCheckStatus::Warning, message)
    }

    #[must_use]
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, DoctorCheckStatus::Error, message)
    }

    fn with_status(
        name: impl Into<String>,
        status: DoctorCheckStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
        }
    }

    /// Returns the CLI prefix for this check status.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self.status {
            DoctorCheckStatus::Ok => "[OK]",
            DoctorCheckStatus::Warning => "[WARN]",
            DoctorCheckStatus::Error => "[FAIL]",
        }
    }
}

/// Runs all doctor checks and returns the results.
#[must_use]
pub fn run_all_checks(
    config: &Config,
    cache: &ToolchainCache,
    source: &dyn ArchiveSource,
    probe: &dyn PlatformProbe,
) -> Vec<DoctorCheck> {
    let mut checks = vec![check_platform(Platform::detect()), check_cache_root(cache)];
    checks.extend(check_versions(cache));
    checks.push(check_active(cache));
    checks.push(check_source(source));
    checks.push(check_org_identity(config));
    checks.push(check_ucrt(probe));
    checks
}

#[must_use]
pub fn check_platform(platform: Platform) -> DoctorCheck {
    if platform.is_windows() {
        DoctorCheck::ok("Platform", "Windows host")
    } else {
        DoctorCheck::warning(
            "Platform",
            format!("{platform} host; 'ensure' does nothing without --force"),
        )
    }
}

#[must_use]
pub fn check_cache_root(cache: &ToolchainCache) -> DoctorCheck {
    let root = &cache.paths().cache_root;
    match cache.paths().list_version_dirs() {
        Ok(names) if names.is_empty() => DoctorCheck::warning(
            "Cache root",
            format!("{} holds no toolchains. Run 'wintc ensure <hash>'.", root.display()),
        ),
        Ok(names) => DoctorCheck::ok(
            "Cache root",
            format!("{} ({} installed)", root.display(), names.len()),
        ),
        Err(e) => DoctorCheck::error("Cache root", format!("{e:#}")),
    }
}

/// One check per installed version, reporting its sidecar state.
#[must_use]
pub fn check_versions(cache: &ToolchainCache) -> Vec<DoctorCheck> {
    let names = cache.paths().list_version_dirs().unwrap_or_default();
    names
        .iter()
        .map(|name| {
            let label = format!("Toolchain {name}");
            match cache.sidecar_state(name) {
                Ok(SidecarState::Valid) => DoctorCheck::ok(label, "sidecar matches files on disk"),
                Ok(SidecarState::Stale) => DoctorCheck::warning(
                    label,
                    "files changed since verification; next run re-hashes",
                ),
                Ok(SidecarState::Missing) => DoctorCheck::warning(
                    label,
                    "no sidecar; will be removed as orphaned by 'wintc gc'",
                ),
                Err(e) => DoctorCheck::error(label, format!("{e:#}")),
            }
        })
        .collect()
}

#[must_use]
pub fn check_active(cache: &ToolchainCache) -> DoctorCheck {
    let info = match ToolchainInfo::read(&cache.paths().info_file()) {
        Ok(Some(info)) => info,
        Ok(None) => return DoctorCheck::warning("Active toolchain", "no data.json written yet"),
        Err(e) => return DoctorCheck::error("Active toolchain", format!("{e:#}")),
    };

    let Some(name) = info.version_name() else {
        return DoctorCheck::error("Active toolchain", format!("bad path {}", info.path));
    };
    if !cache.paths().is_installed(&name) {
        return DoctorCheck::error("Active toolchain", format!("{name} is no longer installed"));
    }
    match cache.compute_hash(&name) {
        Ok(hash) if hash == name => DoctorCheck::ok(
            "Active toolchain",
            format!("{} (VS {})", info.path, info.version),
        ),
        Ok(_) => DoctorCheck::error(
            "Active toolchain",
            format!("{name} does not hash to its name, run 'wintc remove {name}'"),
        ),
        Err(e) => DoctorCheck::error("Active toolchain", format!("{e:#}")),
    }
}

#[must_use]
pub fn check_source(source: &dyn ArchiveSource) -> DoctorCheck {
    if source.is_reachable() {
        DoctorCheck::ok("Archive source", format!("{} reachable", source.describe()))
    } else {
        DoctorCheck::warning(
            "Archive source",
            format!("{} not reachable", source.describe()),
        )
    }
}

#[must_use]
pub fn check_org_identity(config: &Config) -> DoctorCheck {
    match (&config.user_domain, config.org_identity_present()) {
        (_, true) => DoctorCheck::ok("Identity", format!("member of {}", config.org_domain)),
        (Some(domain), false) => DoctorCheck::ok("Identity", format!("user domain {domain}")),
        (None, false) => DoctorCheck::ok("Identity", "no user domain set"),
    }
}

#[must_use]
pub fn check_ucrt(probe: &dyn PlatformProbe) -> DoctorCheck {
    match probe.windows_release() {
        None => DoctorCheck::ok("Universal CRT", "not applicable on this host"),
        Some(release) => match ucrt_installer_name(&release) {
            Some(installer) => DoctorCheck::warning(
                "Universal CRT",
                format!("{release} needs {installer} for VS2015 builds"),
            ),
            None => DoctorCheck::ok("Universal CRT", format!("{release} needs no update")),
        },
    }
}
