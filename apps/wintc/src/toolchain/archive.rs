//! ZIP extraction for toolchain archives.
//!
//! Entries are written below the destination with their relative paths intact
//! (no common-root stripping) and regular files receive the modification time
//! recorded in the archive.

use std::path::{Component, Path};

use anyhow::{Context, Result, bail};
use filetime::FileTime;
use tracing::debug;

/// Extracts `archive_path` into `dest_dir`, returning the number of files written.
///
/// Creates the destination directory if it does not exist.
///
/// # Errors
///
/// Returns an error if:
/// - The archive cannot be opened or is not a valid ZIP file
/// - An entry escapes the destination directory
/// - Directory or file creation fails
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;

        let entry_path = entry
            .enclosed_name()
            .with_context(|| format!("Invalid entry path in archive: entry {i}"))?;

        if entry_path.is_absolute()
            || entry_path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            bail!(
                "Refusing to extract path with parent directory or absolute reference: {}",
                entry_path.display()
            );
        }

        let output_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut outfile = std::fs::File::create(&output_path)
            .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
        std::io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
        drop(outfile);

        if let Some(modified) = entry.last_modified() {
            let mtime = FileTime::from_unix_time(zip_time_to_unix(&modified), 0);
            filetime::set_file_mtime(&output_path, mtime).with_context(|| {
                format!("Failed to set modification time: {}", output_path.display())
            })?;
        }
        written += 1;
    }

    debug!(archive = %archive_path.display(), files = written, "archive extracted");
    Ok(written)
}

/// Converts a ZIP (MS-DOS) timestamp to Unix seconds, reading it as UTC.
fn zip_time_to_unix(time: &zip::DateTime) -> i64 {
    let year = i64::from(time.year());
    let month = i64::from(time.month());
    let day = i64::from(time.day());

    let mut days: i64 = (1970..year).map(|y| if is_leap_year(y) { 366 } else { 365 }).sum();

    let month_days: [i64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let month_index = (month.clamp(1, 12) - 1) as usize;
    days += month_days.iter().take(month_index).sum::<i64>();
    days += day.max(1) - 1;

    days * 86400
        + i64::from(time.hour()) * 3600
        + i64::from(time.minute()) * 60
        + i64::from(time.second())
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
