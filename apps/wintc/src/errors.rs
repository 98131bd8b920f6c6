//! Error types for the wintc CLI.
//!
//! `WintcError` carries the terminal failures a user has to act on. Every
//! variant maps to exit code 1; [`WintcError::guidance`] supplies the extra
//! instructions printed after the error line.
//!
//! A corrupt sidecar has no variant: it is recovered inside the cache
//! by forcing a full re-hash and never reaches the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Page describing how to obtain the toolchain manually when no automated
/// path to the archive store exists.
pub const MANUAL_INSTRUCTIONS_URL: &str =
    "https://www.chromium.org/developers/how-tos/build-instructions-windows";

/// Consolidated error type for wintc operations.
#[derive(Debug, Error)]
pub enum WintcError {
    /// None of the access probes succeeded.
    #[error("no access to the toolchain archive store")]
    AccessDenied,

    /// The bucket is only reachable after a one-time interactive setup.
    #[error("access to {location} requires authentication")]
    AuthenticationRequired {
        /// Human-readable archive location, e.g. `gs://chrome-wintoolchain`.
        location: String,
    },

    /// The downloader exited nonzero or the transfer failed.
    #[error("failed to download {object}: {message}")]
    DownloadFailed {
        /// Archive object that was requested.
        object: String,
        /// What went wrong.
        message: String,
    },

    /// The freshly extracted toolchain does not hash to the requested value.
    #[error(
        "got wrong hash after pulling a new toolchain: wanted '{expected}', got one of '{}'",
        .found.join(", ")
    )]
    HashMismatch {
        /// The hash that was requested.
        expected: String,
        /// Hashes actually present in the cache root after extraction.
        found: Vec<String>,
    },

    /// The named version is not present in the cache root.
    #[error("toolchain {name} is not installed")]
    NotInstalled {
        /// Version directory name.
        name: String,
    },

    /// The archive could not be unpacked.
    #[error("failed to extract {}: {message}", .path.display())]
    ExtractFailed {
        /// Archive being extracted.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

impl WintcError {
    /// Creates a new `AuthenticationRequired` error.
    #[must_use]
    pub fn authentication_required(location: impl Into<String>) -> Self {
        Self::AuthenticationRequired {
            location: location.into(),
        }
    }

    /// Creates a new `DownloadFailed` error.
    #[must_use]
    pub fn download_failed(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates a new `HashMismatch` error.
    #[must_use]
    pub fn hash_mismatch(expected: impl Into<String>, found: Vec<String>) -> Self {
        Self::HashMismatch {
            expected: expected.into(),
            found,
        }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(name: impl Into<String>) -> Self {
        Self::NotInstalled { name: name.into() }
    }

    /// Creates a new `ExtractFailed` error.
    #[must_use]
    pub fn extract_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ExtractFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the follow-up instructions for errors the user must resolve
    /// before re-running.
    #[must_use]
    pub fn guidance(&self) -> Option<String> {
        match self {
            Self::AccessDenied => Some(format!(
                "You do not appear to have access to the prebuilt toolchain.\n\
                 Follow the instructions at {MANUAL_INSTRUCTIONS_URL}\n\
                 to install Visual Studio and the Windows SDK yourself."
            )),
            Self::AuthenticationRequired { location } => Some(format!(
                "Access to {location} has to be configured once before the toolchain can be\n\
                 downloaded. Run:\n\
                 \n    download_from_google_storage --config\n\n\
                 authenticate with your account, then re-run this command."
            )),
            Self::HashMismatch { .. } => Some(
                "The extracted toolchain was left in place for inspection. Remove it with\n\
                 'wintc remove <hash>' once diagnosed."
                    .to_string(),
            ),
            Self::DownloadFailed { .. } | Self::NotInstalled { .. } | Self::ExtractFailed { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_lists_found_hashes() {
        let err = WintcError::hash_mismatch("abc123", vec!["def456".into(), "0a1b".into()]);
        assert_eq!(
            err.to_string(),
            "got wrong hash after pulling a new toolchain: wanted 'abc123', got one of 'def456, 0a1b'"
        );
    }

    #[test]
    fn download_failed_displays_object_and_message() {
        let err = WintcError::download_failed("abc123.zip", "gsutil exited with status 1");
        assert_eq!(
            err.to_string(),
            "failed to download abc123.zip: gsutil exited with status 1"
        );
    }

    #[test]
    fn not_installed_displays_name() {
        let err = WintcError::not_installed("xyz789");
        assert_eq!(err.to_string(), "toolchain xyz789 is not installed");
    }

    #[test]
    fn access_denied_guidance_points_at_manual_instructions() {
        let guidance = WintcError::AccessDenied.guidance().unwrap();
        assert!(guidance.contains(MANUAL_INSTRUCTIONS_URL));
    }

    #[test]
    fn authentication_guidance_names_config_command() {
        let err = WintcError::authentication_required("gs://chrome-wintoolchain");
        assert_eq!(
            err.to_string(),
            "access to gs://chrome-wintoolchain requires authentication"
        );
        assert!(err.guidance().unwrap().contains("--config"));
    }

    #[test]
    fn download_failure_has_no_extra_guidance() {
        assert!(WintcError::download_failed("a.zip", "boom").guidance().is_none());
    }
}
