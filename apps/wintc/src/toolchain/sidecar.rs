//! Sidecar records for fast re-validation of installed versions.
//!
//! A sidecar stores the file list and per-file mtimes captured right after a
//! version was verified, together with its hash:
//!
//! ```json
//! { "files": [["vc\\bin\\cl.exe", 1420070400.0], ...], "sha1": "..." }
//! ```
//!
//! While the on-disk list and mtimes still match, the stored hash is trusted
//! without reading any file contents.

use std::path::Path;

use anyhow::{Context, Result};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::hash::FileEntry;

/// Persisted validation state for one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    /// `(key, mtime seconds)` pairs in file-list order.
    pub files: Vec<(String, f64)>,
    pub sha1: String,
}

impl Sidecar {
    /// Captures the current mtimes of `files` for `sha1`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file's metadata cannot be read.
    pub fn capture(files: &[FileEntry], sha1: &str) -> Result<Self> {
        let files = files
            .iter()
            .map(|f| Ok((f.key.clone(), mtime_secs(&f.path)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            files,
            sha1: sha1.to_string(),
        })
    }

    /// Loads a sidecar, treating a missing or unreadable one as absent.
    ///
    /// Corruption is logged and otherwise ignored; the caller falls back to a
    /// full re-hash.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable sidecar, forcing full re-hash");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt sidecar, forcing full re-hash");
                None
            }
        }
    }

    /// Writes the sidecar to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self).context("Failed to serialize sidecar")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write sidecar: {}", path.display()))?;
        debug!(path = %path.display(), files = self.files.len(), "sidecar saved");
        Ok(())
    }

    /// Whether `files` still matches this record.
    ///
    /// Keys and cardinality must be identical and every mtime unchanged. The
    /// list holds regular files only, so touching the `VC` directory on use
    /// leaves the record valid.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, files: &[FileEntry]) -> bool {
        if self.files.len() != files.len() {
            return false;
        }

        self.files.iter().zip(files).all(|((key, mtime), disk)| {
            *key == disk.key && mtime_secs(&disk.path).is_ok_and(|current| current == *mtime)
        })
    }
}

/// Modification time of `path` as fractional seconds since the Unix epoch.
///
/// # Errors
///
/// Returns an error if the metadata cannot be read.
#[allow(clippy::cast_precision_loss)]
pub fn mtime_secs(path: &Path) -> Result<f64> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    let time = FileTime::from_last_modification_time(&meta);
    Ok(time.unix_seconds() as f64 + f64::from(time.nanoseconds()) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::hash::file_list;

    fn populated() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("VC/bin")).unwrap();
        std::fs::write(temp.path().join("VC/bin/cl.exe"), b"cl").unwrap();
        std::fs::write(temp.path().join("VS_VERSION"), b"2015").unwrap();
        temp
    }

    fn set_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn round_trips_through_json_and_still_matches() {
        let temp = populated();
        let files = file_list(temp.path()).unwrap();
        let home = tempfile::tempdir().unwrap();
        let sidecar_path = home.path().join("abc123.timestamps");

        Sidecar::capture(&files, "abc123").unwrap().save(&sidecar_path).unwrap();
        let loaded = Sidecar::load(&sidecar_path).unwrap();

        assert_eq!(loaded.sha1, "abc123");
        assert!(loaded.matches(&files));
    }

    #[test]
    fn touching_the_touch_dir_keeps_match() {
        let temp = populated();
        let files = file_list(temp.path()).unwrap();
        let sidecar = Sidecar::capture(&files, "abc123").unwrap();

        set_mtime(&temp.path().join("VC"), 1_700_000_000);
        assert!(sidecar.matches(&file_list(temp.path()).unwrap()));
    }

    #[test]
    fn touching_a_file_breaks_match() {
        let temp = populated();
        let files = file_list(temp.path()).unwrap();
        let sidecar = Sidecar::capture(&files, "abc123").unwrap();

        set_mtime(&temp.path().join("VS_VERSION"), 1_500_000_000);
        assert!(!sidecar.matches(&file_list(temp.path()).unwrap()));
    }

    #[test]
    fn adding_or_removing_a_file_breaks_match() {
        let temp = populated();
        let sidecar = Sidecar::capture(&file_list(temp.path()).unwrap(), "abc123").unwrap();

        std::fs::write(temp.path().join("extra.txt"), b"new").unwrap();
        assert!(!sidecar.matches(&file_list(temp.path()).unwrap()));

        std::fs::remove_file(temp.path().join("extra.txt")).unwrap();
        std::fs::remove_file(temp.path().join("VS_VERSION")).unwrap();
        assert!(!sidecar.matches(&file_list(temp.path()).unwrap()));
    }

    #[test]
    fn touching_vc_directory_keeps_sidecar_valid() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("VC/bin")).unwrap();
        std::fs::write(temp.path().join("VC/bin/cl.exe"), b"cl").unwrap();
        let sidecar = Sidecar::capture(&file_list(temp.path()).unwrap(), "abc").unwrap();

        set_mtime(&temp.path().join("VC"), 1_600_000_000);
        assert!(sidecar.matches(&file_list(temp.path()).unwrap()));

        set_mtime(&temp.path().join("VC/bin/cl.exe"), 1_600_000_000);
        assert!(!sidecar.matches(&file_list(temp.path()).unwrap()));
    }

    #[test]
    fn corrupt_or_missing_sidecar_loads_as_none() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("abc.timestamps");
        assert!(Sidecar::load(&path).is_none());

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(Sidecar::load(&path).is_none());
    }
}
