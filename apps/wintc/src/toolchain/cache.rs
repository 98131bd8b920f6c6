//! The content-addressed toolchain cache.
//!
//! Every subdirectory of the cache root is a toolchain version named by its
//! SHA-1 content hash. [`ToolchainCache`] answers which hashes are installed,
//! installs missing ones from an [`ArchiveSource`], and maintains the
//! sidecars that let later runs skip re-hashing.
//!
//! ## Install states
//!
//! ```text
//! Absent -> Downloading -> ExtractedUnverified -> Verified
//!                                       \-> Failed (terminal, directory kept)
//! ```

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use filetime::FileTime;
use tracing::{debug, info, warn};

use super::access::{AccessProbes, check_access};
use super::archive::extract_zip;
use super::hash::{digest, file_list};
use super::paths::CachePaths;
use super::sidecar::Sidecar;
use super::source::ArchiveSource;
use crate::errors::WintcError;

/// Progress of a single [`ToolchainCache::acquire`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// The desired hash is missing; `present` lists what is installed.
    Absent { present: Vec<String> },
    Downloading { object: String },
    ExtractedUnverified { dir: PathBuf },
    /// Hash confirmed and sidecar written.
    Verified { hash: String },
    Failed { expected: String, found: Vec<String> },
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent { present } if present.is_empty() => {
                write!(f, "No toolchain installed")
            }
            Self::Absent { present } => {
                write!(f, "Installed toolchains: {}", present.join(", "))
            }
            Self::Downloading { object } => write!(f, "Downloading {object}..."),
            Self::ExtractedUnverified { dir } => {
                write!(f, "Extracted to {}, verifying...", dir.display())
            }
            Self::Verified { hash } => write!(f, "Toolchain {hash} verified"),
            Self::Failed { expected, found } => write!(
                f,
                "Verification of {expected} failed, found: {}",
                found.join(", ")
            ),
        }
    }
}

/// Result of a successful [`ToolchainCache::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Nothing was fetched or written.
    AlreadyInstalled,
    Installed,
}

/// Validation state of a version's sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarState {
    Valid,
    /// Present but no longer describes the files on disk.
    Stale,
    Missing,
}

impl fmt::Display for SidecarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "verified"),
            Self::Stale => write!(f, "stale sidecar"),
            Self::Missing => write!(f, "no sidecar"),
        }
    }
}

/// Installed toolchain versions below one cache root.
#[derive(Debug, Clone)]
pub struct ToolchainCache {
    paths: CachePaths,
}

impl ToolchainCache {
    #[must_use]
    pub fn new(paths: CachePaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Returns the content hash of every installed version, ordered by
    /// directory name.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root or a version cannot be read.
    pub fn list_installed_hashes(&self) -> Result<Vec<String>> {
        self.paths
            .list_version_dirs()?
            .iter()
            .map(|name| self.compute_hash(name))
            .collect()
    }

    /// Returns the content hash of the version directory `name`.
    ///
    /// A valid sidecar is trusted without reading file contents. Nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked or read.
    pub fn compute_hash(&self, name: &str) -> Result<String> {
        let files = file_list(&self.paths.version_dir(name))?;

        if let Some(sidecar) = Sidecar::load(&self.paths.sidecar_path(name))
            && sidecar.matches(&files)
        {
            debug!(name, "sidecar valid, skipping content hash");
            return Ok(sidecar.sha1);
        }

        println!(
            "Calculating hash of toolchain in {}. Please wait...",
            self.paths.version_dir(name).display()
        );
        digest(&self.paths.cache_root_label(), &files)
    }

    /// Returns the content hash of `name`, always reading every file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked or read.
    pub fn compute_full_hash(&self, name: &str) -> Result<String> {
        let files = file_list(&self.paths.version_dir(name))?;
        digest(&self.paths.cache_root_label(), &files)
    }

    /// Whether `desired` still has to be installed.
    ///
    /// # Errors
    ///
    /// See [`ToolchainCache::list_installed_hashes`].
    pub fn needs_refresh(&self, desired: &str) -> Result<bool> {
        Ok(!self.list_installed_hashes()?.iter().any(|h| h == desired))
    }

    /// Installs `desired` from `source` unless the directory named `desired`
    /// already hashes to `desired`.
    ///
    /// A present version whose sidecar is missing or stale is re-hashed in
    /// full and gets a fresh sidecar. Matching content under another directory
    /// name does not count as installed.
    ///
    /// Access is checked before anything is written. The scratch directory
    /// holding the download is removed on every exit path. A hash mismatch
    /// leaves the extracted directory in place and writes no sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`WintcError::AccessDenied`], [`WintcError::AuthenticationRequired`],
    /// [`WintcError::DownloadFailed`], [`WintcError::ExtractFailed`] or
    /// [`WintcError::HashMismatch`], or an I/O error with context.
    pub fn acquire(
        &self,
        desired: &str,
        source: &dyn ArchiveSource,
        probes: &dyn AccessProbes,
        on_state: &mut dyn FnMut(&InstallState),
    ) -> Result<AcquireOutcome> {
        if self.is_verified(desired)? {
            debug!(desired, "toolchain already installed");
            return Ok(AcquireOutcome::AlreadyInstalled);
        }
        let present = self.list_installed_hashes()?;
        on_state(&InstallState::Absent { present });

        check_access(source, probes)?;

        let scratch = tempfile::Builder::new()
            .prefix("wintc-")
            .tempdir()
            .context("Failed to create scratch directory")?;

        let object = format!("{desired}.zip");
        on_state(&InstallState::Downloading {
            object: object.clone(),
        });
        let archive = source.fetch(&object, scratch.path())?;

        let target = self.paths.version_dir(desired);
        if target.exists() {
            warn!(dir = %target.display(), "replacing directory that does not hash to its name");
            std::fs::remove_dir_all(&target)
                .with_context(|| format!("Failed to remove {}", target.display()))?;
            remove_sidecar(&self.paths, desired);
        }

        info!(archive = %archive.display(), dest = %target.display(), "extracting toolchain");
        extract_zip(&archive, &target)
            .map_err(|e| WintcError::extract_failed(&archive, format!("{e:#}")))?;
        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }
        on_state(&InstallState::ExtractedUnverified {
            dir: target.clone(),
        });

        let found = self.list_installed_hashes()?;
        if !found.iter().any(|h| h == desired) {
            on_state(&InstallState::Failed {
                expected: desired.to_string(),
                found: found.clone(),
            });
            return Err(WintcError::hash_mismatch(desired, found).into());
        }

        self.save_sidecar(desired)?;
        on_state(&InstallState::Verified {
            hash: desired.to_string(),
        });
        Ok(AcquireOutcome::Installed)
    }

    /// Whether the directory named `name` hashes to `name`.
    ///
    /// A valid sidecar is trusted. Otherwise every file is read, and on a
    /// match the sidecar is rewritten so the next check is cheap.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or the sidecar
    /// cannot be written.
    pub fn is_verified(&self, name: &str) -> Result<bool> {
        if !self.paths.is_installed(name) {
            return Ok(false);
        }
        if self.sidecar_state(name)? == SidecarState::Valid {
            return Ok(self.compute_hash(name)? == name);
        }
        if self.compute_full_hash(name)? != name {
            return Ok(false);
        }
        debug!(name, "content verified, refreshing sidecar");
        self.save_sidecar(name)?;
        Ok(true)
    }

    /// Records the current file list and mtimes of `hash` with `hash` as its
    /// content hash. Call only after the content was verified.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be listed or the sidecar written.
    pub fn save_sidecar(&self, hash: &str) -> Result<()> {
        let files = file_list(&self.paths.version_dir(hash))?;
        Sidecar::capture(&files, hash)?.save(&self.paths.sidecar_path(hash))
    }

    /// Reports whether the sidecar of `name` still describes its files.
    ///
    /// # Errors
    ///
    /// Returns an error if the version directory cannot be walked.
    pub fn sidecar_state(&self, name: &str) -> Result<SidecarState> {
        let Some(sidecar) = Sidecar::load(&self.paths.sidecar_path(name)) else {
            return Ok(SidecarState::Missing);
        };
        let files = file_list(&self.paths.version_dir(name))?;
        Ok(if sidecar.matches(&files) {
            SidecarState::Valid
        } else {
            SidecarState::Stale
        })
    }

    /// Marks `hash` as used now by touching its `VC` directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the touch directory exists but cannot be updated.
    pub fn record_use(&self, hash: &str) -> Result<()> {
        let touch = self.paths.touch_dir(hash);
        if !touch.is_dir() {
            debug!(dir = %touch.display(), "no touch directory, last use not recorded");
            return Ok(());
        }
        filetime::set_file_mtime(&touch, FileTime::now())
            .with_context(|| format!("Failed to touch {}", touch.display()))
    }
}

/// Removes the sidecar of `name`, ignoring a missing one.
pub(crate) fn remove_sidecar(paths: &CachePaths, name: &str) {
    let sidecar = paths.sidecar_path(name);
    match std::fs::remove_file(&sidecar) {
        Ok(()) => debug!(path = %sidecar.display(), "sidecar removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %sidecar.display(), error = %e, "failed to remove sidecar"),
    }
}
