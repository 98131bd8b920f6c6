//! Where toolchain archives come from.
//!
//! [`ArchiveSource`] hides the transport. Three implementations exist:
//!
//! - [`GsutilSource`] copies `gs://<bucket>/<hash>.zip` with `gsutil cp`
//! - [`HttpSource`] streams the archive from a plain HTTPS mirror
//! - [`LocalZipSource`] reads a pre-staged `<hash>.zip` from disk
//!
//! No source retries. A failed transfer surfaces as
//! [`WintcError::DownloadFailed`] and the user re-runs.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::WintcError;

/// A place toolchain archives can be fetched from.
pub trait ArchiveSource {
    /// Human-readable location, used in messages.
    fn describe(&self) -> String;

    /// Whether the access probes must pass before fetching.
    fn requires_access_check(&self) -> bool {
        true
    }

    /// Whether the store answers at all with the current credentials.
    fn is_reachable(&self) -> bool;

    /// Fetches `object` into `scratch` and returns the local archive path.
    ///
    /// # Errors
    ///
    /// Returns [`WintcError::DownloadFailed`] when the transfer fails.
    fn fetch(&self, object: &str, scratch: &Path) -> Result<PathBuf>;
}

/// Picks the source selected by `config`: a local directory, then an HTTPS
/// mirror, then the bucket.
#[must_use]
pub fn from_config(config: &Config) -> Box<dyn ArchiveSource> {
    if let Some(dir) = &config.local_zip_dir {
        Box::new(LocalZipSource::new(dir.clone()))
    } else if let Some(url) = &config.mirror_url {
        Box::new(HttpSource::new(url.clone()))
    } else {
        Box::new(GsutilSource::new(config.bucket.clone()))
    }
}

/// Cloud storage bucket accessed through the `gsutil` command.
#[derive(Debug, Clone)]
pub struct GsutilSource {
    bucket: String,
}

impl GsutilSource {
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    fn gsutil() -> Option<PathBuf> {
        which::which("gsutil").ok()
    }
}

impl ArchiveSource for GsutilSource {
    fn describe(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    fn is_reachable(&self) -> bool {
        let Some(gsutil) = Self::gsutil() else {
            debug!("gsutil not found in PATH");
            return false;
        };
        Command::new(gsutil)
            .args(["ls", &format!("gs://{}/", self.bucket)])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn fetch(&self, object: &str, scratch: &Path) -> Result<PathBuf> {
        let gsutil = Self::gsutil()
            .ok_or_else(|| WintcError::download_failed(object, "gsutil not found in PATH"))?;
        let url = format!("gs://{}/{object}", self.bucket);
        let target = scratch.join(object);

        info!(%url, "copying toolchain archive");
        let status = Command::new(gsutil)
            .arg("cp")
            .arg(&url)
            .arg(&target)
            .status()
            .map_err(|e| WintcError::download_failed(object, e.to_string()))?;

        if !status.success() {
            return Err(WintcError::download_failed(
                object,
                format!("gsutil exited with {status}"),
            )
            .into());
        }
        Ok(target)
    }
}

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// HTTPS mirror serving `<base_url>/<hash>.zip`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
}

impl HttpSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, object: &str) -> String {
        format!("{}/{object}", self.base_url)
    }

    fn client() -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .context("Failed to create HTTP client")
    }

    fn download(&self, object: &str, dest: &Path) -> Result<()> {
        let url = self.url(object);
        let mut response = Self::client()?
            .get(&url)
            .send()
            .with_context(|| format!("Failed to connect to {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error {}: {url}", response.status());
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut file = std::fs::File::create(dest)
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut buffer = vec![0u8; 64 * 1024];
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        loop {
            let read = response
                .read(&mut buffer)
                .with_context(|| format!("Failed to read from {url}"))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .with_context(|| format!("Failed to write to {}", dest.display()))?;
            downloaded += read as u64;

            if last_update.elapsed().as_millis() >= PROGRESS_INTERVAL_MS {
                print_progress(object, downloaded, total_size, start_time.elapsed().as_secs_f64());
                last_update = Instant::now();
            }
        }

        file.flush()
            .with_context(|| format!("Failed to flush {}", dest.display()))?;
        print_progress(object, downloaded, total_size, start_time.elapsed().as_secs_f64());
        println!();
        Ok(())
    }
}

impl ArchiveSource for HttpSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    /// The mirror is public; there is nothing to authenticate against.
    fn requires_access_check(&self) -> bool {
        false
    }

    fn is_reachable(&self) -> bool {
        let Ok(client) = Self::client() else {
            return false;
        };
        client
            .head(&self.base_url)
            .send()
            .is_ok_and(|r| !r.status().is_server_error())
    }

    fn fetch(&self, object: &str, scratch: &Path) -> Result<PathBuf> {
        let target = scratch.join(object);
        info!(url = %self.url(object), "downloading toolchain archive");
        self.download(object, &target)
            .map_err(|e| WintcError::download_failed(object, format!("{e:#}")))?;
        Ok(target)
    }
}

/// Directory holding archives staged by hand, used with `USE_LOCAL_ZIP=1`.
#[derive(Debug, Clone)]
pub struct LocalZipSource {
    dir: PathBuf,
}

impl LocalZipSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArchiveSource for LocalZipSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn requires_access_check(&self) -> bool {
        false
    }

    fn is_reachable(&self) -> bool {
        self.dir.is_dir()
    }

    /// Archives are used in place; nothing is copied into `scratch`.
    fn fetch(&self, object: &str, _scratch: &Path) -> Result<PathBuf> {
        let path = self.dir.join(object);
        if !path.is_file() {
            return Err(WintcError::download_failed(
                object,
                format!("{} does not exist", path.display()),
            )
            .into());
        }
        Ok(path)
    }
}

/// Rewrites the current terminal line with the transfer state of `object`.
fn print_progress(object: &str, downloaded: u64, total: u64, elapsed_secs: f64) {
    print!("\r{}     ", progress_line(object, downloaded, total, elapsed_secs));
    let _ = std::io::stdout().flush();
}

/// `<object>: <done>[/<total> (<pct>%)] at <rate>`; the mirror may not send
/// a length, in which case only the received amount is shown.
#[allow(clippy::cast_precision_loss)]
fn progress_line(object: &str, downloaded: u64, total: u64, elapsed_secs: f64) -> String {
    let rate = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };
    let done = human_size(downloaded as f64);
    let amount = if total > 0 {
        let pct = downloaded.saturating_mul(100) / total;
        format!("{done}/{} ({pct}%)", human_size(total as f64))
    } else {
        done
    };
    format!("{object}: {amount} at {}/s", human_size(rate))
}

/// Formats a byte count with a binary unit (B, KB, MB, GB).
fn human_size(bytes: f64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024.0 {
        return format!("{bytes:.0} B");
    }
    let mut value = bytes / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = *next;
    }
    format!("{value:.2} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;

    fn downcast(err: &anyhow::Error) -> &WintcError {
        err.downcast_ref::<WintcError>().expect("typed error")
    }

    #[test]
    fn local_source_returns_staged_archive_in_place() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("abc123.zip"), b"zip").unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let source = LocalZipSource::new(temp.path());
        assert!(!source.requires_access_check());
        assert!(source.is_reachable());

        let fetched = source.fetch("abc123.zip", scratch.path()).unwrap();
        assert_eq!(fetched, temp.path().join("abc123.zip"));
    }

    #[test]
    fn local_source_missing_archive_is_download_failure() {
        let temp = tempfile::tempdir().unwrap();
        let err = LocalZipSource::new(temp.path())
            .fetch("missing.zip", temp.path())
            .unwrap_err();
        assert!(matches!(downcast(&err), WintcError::DownloadFailed { object, .. } if object == "missing.zip"));
    }

    #[test]
    fn http_source_builds_object_urls() {
        let source = HttpSource::new("https://mirror.example/wintc/");
        assert_eq!(source.url("abc.zip"), "https://mirror.example/wintc/abc.zip");
        assert!(!source.requires_access_check());
    }

    #[test]
    fn gsutil_source_describes_bucket() {
        let source = GsutilSource::new("chrome-wintoolchain");
        assert_eq!(source.describe(), "gs://chrome-wintoolchain");
        assert!(source.requires_access_check());
    }

    #[test]
    fn config_selects_source_by_precedence() {
        let temp = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            home: Some(temp.path().to_path_buf()),
            ..Overrides::default()
        };
        let mut config = Config::load_with(&overrides, |_| None).unwrap();
        assert_eq!(from_config(&config).describe(), "gs://chrome-wintoolchain");

        config.mirror_url = Some("https://mirror.example".into());
        assert_eq!(from_config(&config).describe(), "https://mirror.example");

        config.local_zip_dir = Some(temp.path().to_path_buf());
        assert_eq!(
            from_config(&config).describe(),
            temp.path().display().to_string()
        );
    }

    #[test]
    fn human_size_scales_units() {
        assert_eq!(human_size(512.0), "512 B");
        assert_eq!(human_size(2048.0), "2.00 KB");
        assert_eq!(human_size(3.0 * 1024.0 * 1024.0), "3.00 MB");
        assert_eq!(human_size(5.0 * 1024.0 * 1024.0 * 1024.0), "5.00 GB");
    }

    #[test]
    fn progress_line_names_the_archive() {
        assert_eq!(
            progress_line("abc.zip", 1024, 4096, 1.0),
            "abc.zip: 1.00 KB/4.00 KB (25%) at 1.00 KB/s"
        );
        assert_eq!(progress_line("abc.zip", 100, 0, 0.0), "abc.zip: 100 B at 0 B/s");
    }
}
