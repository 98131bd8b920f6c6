//! Content hashing for installed toolchain versions.
//!
//! The digest covers every regular file below a version directory: its
//! normalized path followed by its bytes, in a stable order. The version
//! directory's own name never enters the digest, so two copies of the same
//! bundle hash identically wherever they were unpacked.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use walkdir::WalkDir;

/// Crash reports left behind by `cl.exe` and `vctip.exe`. Files under this
/// directory never count towards the hash.
pub const CRASH_REPORT_DIR: &str = r"wer\reportqueue";

/// A file belonging to a toolchain version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the version root, lower-cased, `\` separated.
    pub key: String,
    /// Location on disk.
    pub path: PathBuf,
}

/// Returns the hashable files under `version_dir`, sorted by key.
///
/// # Errors
///
/// Returns an error if the directory tree cannot be walked.
pub fn file_list(version_dir: &Path) -> Result<Vec<FileEntry>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(version_dir).min_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to walk {}", version_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let key = normalize_key(version_dir, entry.path());
        if key.contains(CRASH_REPORT_DIR) {
            continue;
        }

        files.push(FileEntry {
            key,
            path: entry.into_path(),
        });
    }

    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

/// Builds the normalized key of `path` relative to `root`.
fn normalize_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect::<Vec<_>>()
        .join("\\")
}

/// Computes the hex SHA-1 over `files`, prefixing each key with `root_label`.
///
/// # Errors
///
/// Returns an error if any file cannot be read.
pub fn digest(root_label: &str, files: &[FileEntry]) -> Result<String> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; 8192];

    for entry in files {
        hasher.update(format!("{root_label}\\{}", entry.key).as_bytes());

        let mut file = std::fs::File::open(&entry.path)
            .with_context(|| format!("Failed to open file for hashing: {}", entry.path.display()))?;
        loop {
            let bytes_read = file.read(&mut buffer).with_context(|| {
                format!("Failed to read file for hashing: {}", entry.path.display())
            })?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn populate(root: &Path) {
        write(root, "VC/bin/cl.exe", b"compiler");
        write(root, "win_sdk/Include/windows.h", b"#pragma once");
        write(root, "VS_VERSION", b"2015");
    }

    #[test]
    fn keys_are_relative_lowercase_and_backslashed() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());

        let keys: Vec<_> = file_list(temp.path())
            .unwrap()
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(
            keys,
            vec![r"vc\bin\cl.exe", "vs_version", r"win_sdk\include\windows.h"]
        );
    }

    #[test]
    fn crash_reports_are_excluded() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());
        let before = digest("vs_files", &file_list(temp.path()).unwrap()).unwrap();

        write(temp.path(), "VC/bin/WER/ReportQueue/crash.wer", b"crash");
        let files = file_list(temp.path()).unwrap();
        assert!(files.iter().all(|f| !f.key.contains("reportqueue")));
        assert_eq!(digest("vs_files", &files).unwrap(), before);
    }

    #[test]
    fn digest_is_independent_of_parent_directory_name() {
        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join("aaa");
        let second = temp.path().join("bbb");
        populate(&first);
        populate(&second);

        let a = digest("vs_files", &file_list(&first).unwrap()).unwrap();
        let b = digest("vs_files", &file_list(&second).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn digest_depends_on_contents_paths_and_label() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());
        let base = digest("vs_files", &file_list(temp.path()).unwrap()).unwrap();

        assert_ne!(
            digest("vs2013_files", &file_list(temp.path()).unwrap()).unwrap(),
            base
        );

        write(temp.path(), "VS_VERSION", b"2013");
        let changed = digest("vs_files", &file_list(temp.path()).unwrap()).unwrap();
        assert_ne!(changed, base);
    }

    #[test]
    fn digest_of_known_input() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "a.txt", b"hi");

        // sha1("vs_files\\a.txthi")
        let mut expected = Sha1::new();
        expected.update(b"vs_files\\a.txthi");
        assert_eq!(
            digest("vs_files", &file_list(temp.path()).unwrap()).unwrap(),
            hex::encode(expected.finalize())
        );
    }
}
