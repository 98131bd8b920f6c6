//! Eviction of unused toolchain versions.
//!
//! Every top-level entry of the cache root is classified:
//! - a plain file is a stray left by a failed extraction and is removed
//! - a directory without a sidecar is an orphan and is removed immediately
//! - a directory with a sidecar whose last use is older than the retention
//!   window is removed after an interruptible countdown
//!
//! Everything else is kept.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::cache::{ToolchainCache, remove_sidecar};
use super::paths::CachePaths;
use crate::config::Config;

/// Background processes that keep files inside a toolchain open.
pub const RESIDENT_PROCESSES: [&str; 2] = ["mspdbsrv.exe", "vctip.exe"];

const SECS_PER_DAY: u64 = 86400;

/// Eviction policy configuration.
#[derive(Debug, Clone)]
pub struct EvictionPolicy {
    /// Versions unused for longer than this are expired.
    pub max_age_days: u64,
    /// Length of the countdown before removing an expired version.
    pub countdown_secs: u64,
    /// Skip the countdown.
    pub headless: bool,
    /// Report without deleting.
    pub dry_run: bool,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            countdown_secs: 9,
            headless: false,
            dry_run: false,
        }
    }
}

impl EvictionPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_age_days: config.retention_days,
            countdown_secs: config.removal_countdown_secs,
            headless: config.headless,
            dry_run: false,
        }
    }

    /// Set dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Countdown to run before removing an expired version, if any.
    #[must_use]
    pub fn removal_delay(&self) -> Option<u64> {
        (!self.headless && self.countdown_secs > 0).then_some(self.countdown_secs)
    }

    fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days.saturating_mul(SECS_PER_DAY))
    }
}

/// Why an entry was evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionReason {
    /// Directory without a sidecar.
    Orphaned,
    /// Last use is older than the retention window.
    Expired { unused_days: u64 },
    /// Plain file directly in the cache root.
    StrayFile,
}

/// An entry selected for eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub name: String,
    pub reason: EvictionReason,
}

/// Result of an eviction run.
#[derive(Debug, Clone, Default)]
pub struct EvictionReport {
    /// Number of top-level entries examined.
    pub scanned: usize,
    /// Entries removed (or that would be, in dry-run mode).
    pub evicted: Vec<Eviction>,
    /// Versions left in place.
    pub kept: Vec<String>,
    /// Non-fatal removal failures.
    pub errors: Vec<String>,
}

/// Evicts orphaned, stray and expired entries from the cache root.
///
/// Removal failures are collected in the report rather than aborting the run.
///
/// # Errors
///
/// Returns an error if the cache root exists but cannot be read.
pub fn evict_unused(
    cache: &ToolchainCache,
    policy: &EvictionPolicy,
    now: SystemTime,
) -> Result<EvictionReport> {
    let paths = cache.paths();
    let mut report = EvictionReport::default();

    if !paths.cache_root.exists() {
        return Ok(report);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&paths.cache_root)
        .with_context(|| format!("Failed to read cache root: {}", paths.cache_root.display()))?
        .flatten()
        .collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        report.scanned += 1;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if !path.is_dir() {
            report.evicted.push(Eviction {
                name: name.clone(),
                reason: EvictionReason::StrayFile,
            });
            if !policy.dry_run
                && let Err(e) = std::fs::remove_file(&path)
            {
                report.errors.push(format!("{}: {e}", path.display()));
            }
            continue;
        }

        let (reason, delay) = if !paths.sidecar_path(&name).exists() {
            (EvictionReason::Orphaned, None)
        } else {
            let unused = paths
                .last_used(&name)
                .and_then(|used| now.duration_since(used).ok())
                .unwrap_or_default();
            if unused <= policy.max_age() {
                debug!(%name, unused_days = unused.as_secs() / SECS_PER_DAY, "keeping toolchain");
                report.kept.push(name);
                continue;
            }
            (
                EvictionReason::Expired {
                    unused_days: unused.as_secs() / SECS_PER_DAY,
                },
                policy.removal_delay(),
            )
        };

        info!(%name, ?reason, dry_run = policy.dry_run, "evicting toolchain");
        report.evicted.push(Eviction {
            name: name.clone(),
            reason,
        });
        if !policy.dry_run
            && let Err(e) = remove_version(paths, &name, delay)
        {
            report.errors.push(format!("{name}: {e:#}"));
        }
    }

    Ok(report)
}

/// Removes version `name` and its sidecar.
///
/// With a `delay`, an interruptible countdown runs first. Resident toolchain
/// processes are terminated before the tree is deleted.
///
/// # Errors
///
/// Returns an error if the directory cannot be removed.
pub fn remove_version(paths: &CachePaths, name: &str, delay: Option<u64>) -> Result<()> {
    let dir = paths.version_dir(name);

    if let Some(secs) = delay
        && dir.exists()
    {
        countdown(secs);
    }

    kill_resident_processes();
    remove_tree(&dir)?;
    remove_sidecar(paths, name);
    Ok(())
}

/// Gives an operator the chance to press Ctrl-C.
fn countdown(secs: u64) {
    for remaining in (1..=secs).rev() {
        print!("\rRemoving old toolchain in {remaining}s... (Ctrl-C to cancel)");
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_secs(1));
    }
    println!();
}

/// Terminates processes that lock files inside toolchain directories.
fn kill_resident_processes() {
    #[cfg(windows)]
    {
        for image in RESIDENT_PROCESSES {
            let status = std::process::Command::new("taskkill")
                .args(["/f", "/im", image])
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status();
            debug!(image, ?status, "taskkill");
        }
    }
    #[cfg(not(windows))]
    {
        debug!(processes = ?RESIDENT_PROCESSES, "no resident processes to stop on this platform");
    }
}

/// Removes `dir` recursively, clearing read-only attributes and retrying once.
#[allow(clippy::permissions_set_readonly_false)]
fn remove_tree(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    if let Err(first) = std::fs::remove_dir_all(dir) {
        warn!(dir = %dir.display(), error = %first, "removal failed, clearing read-only attributes");
        for entry in WalkDir::new(dir).into_iter().flatten() {
            if let Ok(meta) = entry.metadata() {
                let mut perms = meta.permissions();
                if perms.readonly() {
                    perms.set_readonly(false);
                    let _ = std::fs::set_permissions(entry.path(), perms);
                }
            }
        }
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::cache::tests::{FIXTURE, write_tree};
    use filetime::FileTime;

    const DAY: Duration = Duration::from_secs(SECS_PER_DAY);

    fn headless() -> EvictionPolicy {
        EvictionPolicy {
            headless: true,
            ..EvictionPolicy::default()
        }
    }

    fn setup() -> (tempfile::TempDir, ToolchainCache) {
        let home = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::new(CachePaths::new(home.path(), "vs_files"));
        (home, cache)
    }

    /// Installs a version with a sidecar, last used `days` ago.
    fn install(cache: &ToolchainCache, name: &str, days: u64) {
        write_tree(&cache.paths().version_dir(name), FIXTURE);
        cache.save_sidecar(name).unwrap();
        let used = SystemTime::now() - DAY * u32::try_from(days).unwrap();
        filetime::set_file_mtime(
            cache.paths().touch_dir(name),
            FileTime::from_system_time(used),
        )
        .unwrap();
    }

    fn names(report: &EvictionReport) -> Vec<&str> {
        report.evicted.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn orphan_is_removed_and_recent_version_kept() {
        let (_home, cache) = setup();
        install(&cache, "abc123", 0);
        write_tree(&cache.paths().version_dir("xyz789"), &[("VC/partial", b"x")]);

        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(
            report.evicted,
            vec![Eviction {
                name: "xyz789".into(),
                reason: EvictionReason::Orphaned
            }]
        );
        assert_eq!(report.kept, vec!["abc123"]);
        assert!(!cache.paths().version_dir("xyz789").exists());
        assert!(cache.paths().version_dir("abc123").is_dir());
        assert!(cache.paths().sidecar_path("abc123").is_file());
    }

    #[test]
    fn huge_retention_keeps_old_versions() {
        let (_home, cache) = setup();
        install(&cache, "abc123", 400);
        let policy = EvictionPolicy {
            max_age_days: u64::MAX / 1000,
            ..headless()
        };

        let report = evict_unused(&cache, &policy, SystemTime::now()).unwrap();

        assert!(report.evicted.is_empty());
        assert_eq!(report.kept, vec!["abc123"]);
    }

    #[test]
    fn orphan_is_removed_even_when_fresh() {
        let (_home, cache) = setup();
        write_tree(&cache.paths().version_dir("new"), FIXTURE);

        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();
        assert_eq!(names(&report), vec!["new"]);
    }

    #[test]
    fn expired_version_and_sidecar_are_removed() {
        let (_home, cache) = setup();
        install(&cache, "old", 40);
        install(&cache, "young", 10);

        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();

        assert_eq!(names(&report), vec!["old"]);
        assert!(matches!(
            report.evicted[0].reason,
            EvictionReason::Expired { unused_days } if unused_days >= 39
        ));
        assert!(!cache.paths().version_dir("old").exists());
        assert!(!cache.paths().sidecar_path("old").exists());
        assert_eq!(report.kept, vec!["young"]);
    }

    #[test]
    fn stray_files_are_removed() {
        let (_home, cache) = setup();
        install(&cache, "abc123", 1);
        std::fs::write(cache.paths().cache_root.join("abc123.zip"), b"partial").unwrap();

        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();

        assert_eq!(report.evicted[0].reason, EvictionReason::StrayFile);
        assert!(!cache.paths().cache_root.join("abc123.zip").exists());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn dry_run_deletes_nothing() {
        let (_home, cache) = setup();
        install(&cache, "old", 45);
        write_tree(&cache.paths().version_dir("orphan"), FIXTURE);

        let report =
            evict_unused(&cache, &headless().with_dry_run(), SystemTime::now()).unwrap();

        assert_eq!(names(&report), vec!["old", "orphan"]);
        assert!(cache.paths().version_dir("old").is_dir());
        assert!(cache.paths().version_dir("orphan").is_dir());
        assert!(cache.paths().sidecar_path("old").is_file());
    }

    #[test]
    fn version_without_touch_dir_ages_by_directory_mtime() {
        let (_home, cache) = setup();
        let dir = cache.paths().version_dir("plain");
        write_tree(&dir, &[("bin/tool.exe", b"t")]);
        cache.save_sidecar("plain").unwrap();
        let used = SystemTime::now() - DAY * 60;
        filetime::set_file_mtime(&dir, FileTime::from_system_time(used)).unwrap();

        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();
        assert_eq!(names(&report), vec!["plain"]);
    }

    #[test]
    fn missing_cache_root_is_an_empty_report() {
        let (_home, cache) = setup();
        let report = evict_unused(&cache, &headless(), SystemTime::now()).unwrap();
        assert_eq!(report.scanned, 0);
    }

    #[test]
    fn removal_delay_respects_headless_and_zero_countdown() {
        assert_eq!(EvictionPolicy::default().removal_delay(), Some(9));
        assert_eq!(headless().removal_delay(), None);
        let zero = EvictionPolicy {
            countdown_secs: 0,
            ..EvictionPolicy::default()
        };
        assert_eq!(zero.removal_delay(), None);
    }

    #[test]
    fn remove_version_deletes_directory_and_sidecar() {
        let (_home, cache) = setup();
        install(&cache, "abc123", 0);

        remove_version(cache.paths(), "abc123", None).unwrap();

        assert!(!cache.paths().version_dir("abc123").exists());
        assert!(!cache.paths().sidecar_path("abc123").exists());
    }
}
