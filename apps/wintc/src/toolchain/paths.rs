//! Path management for the toolchain cache.
//!
//! ## Directory Structure
//!
//! ```text
//! <home>/                         # WINTC_HOME or the platform default
//!   config.toml                   # Optional settings
//!   data.json                     # Combined info for the active toolchain
//!   <hash>.timestamps             # Sidecar, one per verified version
//!   vs2013_files/ | vs_files/     # Cache root for the selected VS generation
//!     <hash>/                     # One toolchain version
//!       VC/                       # Touch directory, mtime = last use
//!       win_sdk/ ...
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

use crate::config::Config;

/// Name of the combined info file written after every successful `ensure`.
pub const INFO_FILE: &str = "data.json";

/// Directory inside a version whose mtime marks the last use.
pub const TOUCH_DIR: &str = "VC";

/// Extension of the per-version sidecar file.
const SIDECAR_EXTENSION: &str = "timestamps";

/// Resolves every path the cache reads or writes.
#[derive(Debug, Clone)]
pub struct CachePaths {
    /// Home directory, parent of the cache root.
    pub home: PathBuf,
    /// Directory holding one subdirectory per installed version.
    pub cache_root: PathBuf,
}

impl CachePaths {
    /// Creates paths for a cache root directly below `home`.
    #[must_use = "returns new paths instance without side effects"]
    pub fn new(home: impl Into<PathBuf>, cache_dir_name: &str) -> Self {
        let home = home.into();
        Self {
            cache_root: home.join(cache_dir_name),
            home,
        }
    }

    /// Creates paths for the home directory and VS generation in `config`.
    #[must_use = "returns new paths instance without side effects"]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.home.clone(), config.vs_version.cache_dir_name())
    }

    /// Lower-cased final component of the cache root, mixed into every digest.
    #[must_use]
    pub fn cache_root_label(&self) -> String {
        self.cache_root
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn version_dir(&self, name: &str) -> PathBuf {
        self.cache_root.join(name)
    }

    #[must_use]
    pub fn touch_dir(&self, name: &str) -> PathBuf {
        self.version_dir(name).join(TOUCH_DIR)
    }

    /// Sidecars live in the home directory, beside the cache root.
    #[must_use]
    pub fn sidecar_path(&self, name: &str) -> PathBuf {
        self.home.join(format!("{name}.{SIDECAR_EXTENSION}"))
    }

    #[must_use]
    pub fn info_file(&self) -> PathBuf {
        self.home.join(INFO_FILE)
    }

    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.version_dir(name).is_dir()
    }

    /// Returns the names of all version directories, sorted.
    ///
    /// A missing cache root yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root exists but cannot be read.
    pub fn list_version_dirs(&self) -> Result<Vec<String>> {
        if !self.cache_root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.cache_root).with_context(|| {
            format!(
                "Failed to read cache root: {}",
                self.cache_root.display()
            )
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Returns the time a version was last used.
    ///
    /// This is the mtime of the touch directory, falling back to the version
    /// directory itself for bundles that do not ship one.
    #[must_use]
    pub fn last_used(&self, name: &str) -> Option<SystemTime> {
        modified(&self.touch_dir(name)).or_else(|| modified(&self.version_dir(name)))
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Formats the distance between `then` and `now` as a short phrase such as
/// "yesterday" or "3 weeks ago".
#[must_use]
pub fn format_age(then: SystemTime, now: SystemTime) -> String {
    let diff_days = now
        .duration_since(then)
        .map_or(0, |d| d.as_secs() / 86400);

    match diff_days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        2..=6 => format!("{diff_days} days ago"),
        7..=13 => "1 week ago".to_string(),
        14..=20 => "2 weeks ago".to_string(),
        21..=27 => "3 weeks ago".to_string(),
        28..=59 => "1 month ago".to_string(),
        60..=364 => format!("{} months ago", diff_days / 30),
        _ => format!("{} years ago", diff_days / 365),
    }
}
