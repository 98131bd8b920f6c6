//! Combined toolchain info consumed by build orchestration (`data.json`).

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File inside a version naming its Visual Studio release.
const VERSION_FILE: &str = "VS_VERSION";

/// Release assumed for bundles that predate `VS_VERSION`.
const LEGACY_VERSION: &str = "2013";

/// Paths and version of the active toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainInfo {
    /// Absolute install directory.
    pub path: String,
    pub version: String,
    pub win_sdk: String,
    /// Same as `win_sdk`; kept for consumers that still read the old key.
    pub win8sdk: String,
    pub wdk: String,
    /// 64-bit and 32-bit runtime DLL directories, in that order.
    pub runtime_dirs: Vec<String>,
}

impl ToolchainInfo {
    /// Resolves the info for an installed version directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be made absolute or `VS_VERSION`
    /// exists but cannot be read.
    pub fn resolve(version_dir: &Path) -> Result<Self> {
        let abs = std::path::absolute(version_dir)
            .with_context(|| format!("Failed to resolve {}", version_dir.display()))?;

        let version_file = abs.join(VERSION_FILE);
        let (version, sdk_dir) = if version_file.is_file() {
            let version = std::fs::read_to_string(&version_file)
                .with_context(|| format!("Failed to read {}", version_file.display()))?;
            (version.trim().to_string(), "win_sdk")
        } else {
            (LEGACY_VERSION.to_string(), "win8sdk")
        };

        let display = |sub: &str| abs.join(sub).display().to_string();
        let win_sdk = display(sdk_dir);

        Ok(Self {
            path: abs.display().to_string(),
            version,
            win8sdk: win_sdk.clone(),
            win_sdk,
            wdk: display("wdk"),
            runtime_dirs: vec![display("sys64"), display("sys32")],
        })
    }

    /// Reads a previously written info file. A missing file yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or malformed.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let info = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(info))
    }

    /// Writes the info as JSON, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize toolchain info")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Name of the version directory this info points at.
    #[must_use]
    pub fn version_name(&self) -> Option<String> {
        Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
    }
}
