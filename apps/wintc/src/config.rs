//! Runtime configuration for wintc.
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `<home>/config.toml`
//! 3. Environment variables
//! 4. Command-line flags
//!
//! The environment is read exactly once, through a lookup function, so the
//! cache itself never inspects ambient process state.
//!
//! ## Environment Variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `WINTC_HOME` | Home directory holding the cache root and sidecars |
//! | `CHROME_HEADLESS=1` | Skip interactive countdowns |
//! | `GYP_MSVS_VERSION=2015` | Use the Visual Studio 2015 cache root |
//! | `USE_LOCAL_ZIP=1` | Read `<hash>.zip` from a local directory instead of the bucket |
//! | `USERDOMAIN` | Compared with the organisation domain as an access signal |

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Environment variable overriding the home directory.
pub const WINTC_HOME_ENV: &str = "WINTC_HOME";

/// Name of the optional configuration file inside the home directory.
pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_BUCKET: &str = "chrome-wintoolchain";
const DEFAULT_SOURCE_CONTROL_URL: &str = "https://chrome-internal.googlesource.com/chrome/data/wintoolchain";
const DEFAULT_ORG_DOMAIN: &str = "GOOGLE";
const DEFAULT_RETENTION_DAYS: u64 = 30;
const DEFAULT_COUNTDOWN_SECS: u64 = 9;

/// Visual Studio generation whose toolchains are managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VsVersion {
    /// Visual Studio 2013, cached under `vs2013_files`.
    #[default]
    Vs2013,
    /// Visual Studio 2015, cached under `vs_files`.
    Vs2015,
}

impl VsVersion {
    /// Parses a year string as used by `GYP_MSVS_VERSION` and `--vs-version`.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than `2013` or `2015`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "2013" => Ok(Self::Vs2013),
            "2015" => Ok(Self::Vs2015),
            other => bail!("Unsupported Visual Studio version '{other}' (expected 2013 or 2015)"),
        }
    }

    /// Directory name of the cache root for this generation.
    #[must_use]
    pub const fn cache_dir_name(self) -> &'static str {
        match self {
            Self::Vs2013 => "vs2013_files",
            Self::Vs2015 => "vs_files",
        }
    }
}

impl fmt::Display for VsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vs2013 => write!(f, "2013"),
            Self::Vs2015 => write!(f, "2015"),
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bucket: Option<String>,
    mirror_url: Option<String>,
    source_control_url: Option<String>,
    org_domain: Option<String>,
    retention_days: Option<u64>,
    removal_countdown_secs: Option<u64>,
    local_zip_dir: Option<PathBuf>,
}

/// Values supplied on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub home: Option<PathBuf>,
    pub vs_version: Option<VsVersion>,
    pub headless: bool,
}

/// Fully resolved configuration handed to the cache and commands.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cache root, sidecars and `data.json`.
    pub home: PathBuf,
    pub vs_version: VsVersion,
    /// Skip interactive countdowns before removal.
    pub headless: bool,
    /// When set, archives are read from this directory instead of downloaded.
    pub local_zip_dir: Option<PathBuf>,
    pub bucket: String,
    /// Optional public HTTPS mirror serving `<hash>.zip`.
    pub mirror_url: Option<String>,
    pub source_control_url: String,
    pub org_domain: String,
    /// Value of `USERDOMAIN` at startup.
    pub user_domain: Option<String>,
    pub retention_days: u64,
    pub removal_countdown_secs: u64,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or
    /// `config.toml` is unreadable or malformed.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_with(overrides, |key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_with<F>(overrides: &Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = match (&overrides.home, lookup(WINTC_HOME_ENV)) {
            (Some(home), _) => home.clone(),
            (None, Some(home)) if !home.is_empty() => PathBuf::from(home),
            _ => default_home()?,
        };

        let file = read_file_config(&home.join(CONFIG_FILE))?;

        let vs_version = match (overrides.vs_version, lookup("GYP_MSVS_VERSION")) {
            (Some(version), _) => version,
            (None, Some(value)) if value == "2015" => VsVersion::Vs2015,
            _ => VsVersion::Vs2013,
        };

        let headless = overrides.headless || lookup("CHROME_HEADLESS").as_deref() == Some("1");

        let local_zip_dir = if lookup("USE_LOCAL_ZIP").as_deref() == Some("1") {
            Some(file.local_zip_dir.clone().unwrap_or_else(|| home.clone()))
        } else {
            None
        };

        Ok(Self {
            vs_version,
            headless,
            local_zip_dir,
            bucket: file.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            mirror_url: file.mirror_url,
            source_control_url: file
                .source_control_url
                .unwrap_or_else(|| DEFAULT_SOURCE_CONTROL_URL.to_string()),
            org_domain: file
                .org_domain
                .unwrap_or_else(|| DEFAULT_ORG_DOMAIN.to_string()),
            user_domain: lookup("USERDOMAIN").filter(|d| !d.is_empty()),
            retention_days: file.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            removal_countdown_secs: file
                .removal_countdown_secs
                .unwrap_or(DEFAULT_COUNTDOWN_SECS),
            home,
        })
    }

    /// Whether the captured user domain matches the organisation domain.
    #[must_use]
    pub fn org_identity_present(&self) -> bool {
        self.user_domain
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case(&self.org_domain))
    }
}

/// `%LOCALAPPDATA%\wintc` on Windows, `~/.wintc` elsewhere.
fn default_home() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        Ok(dirs::data_local_dir()
            .context("Cannot determine LocalAppData directory. Set WINTC_HOME environment variable.")?
            .join("wintc"))
    }
    #[cfg(not(windows))]
    {
        Ok(dirs::home_dir()
            .context("Cannot determine home directory. Set WINTC_HOME environment variable.")?
            .join(".wintc"))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_home(home: &Path) -> Overrides {
        Overrides {
            home: Some(home.to_path_buf()),
            ..Overrides::default()
        }
    }

    #[test]
    fn defaults_apply_without_file_or_environment() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::load_with(&with_home(temp.path()), lookup_from(&[])).unwrap();

        assert_eq!(config.home, temp.path());
        assert_eq!(config.vs_version, VsVersion::Vs2013);
        assert!(!config.headless);
        assert!(config.local_zip_dir.is_none());
        assert_eq!(config.bucket, "chrome-wintoolchain");
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.removal_countdown_secs, 9);
    }

    #[test]
    fn environment_selects_home_and_modes() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path().to_string_lossy().to_string();
        let config = Config::load_with(
            &Overrides::default(),
            lookup_from(&[
                (WINTC_HOME_ENV, &home),
                ("GYP_MSVS_VERSION", "2015"),
                ("CHROME_HEADLESS", "1"),
                ("USE_LOCAL_ZIP", "1"),
                ("USERDOMAIN", "google"),
            ]),
        )
        .unwrap();

        assert_eq!(config.home, temp.path());
        assert_eq!(config.vs_version, VsVersion::Vs2015);
        assert!(config.headless);
        assert_eq!(config.local_zip_dir.as_deref(), Some(temp.path()));
        assert!(config.org_identity_present());
    }

    #[test]
    fn command_line_wins_over_environment() {
        let temp = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            home: Some(temp.path().to_path_buf()),
            vs_version: Some(VsVersion::Vs2013),
            headless: true,
        };
        let config = Config::load_with(
            &overrides,
            lookup_from(&[("GYP_MSVS_VERSION", "2015"), (WINTC_HOME_ENV, "/elsewhere")]),
        )
        .unwrap();

        assert_eq!(config.home, temp.path());
        assert_eq!(config.vs_version, VsVersion::Vs2013);
        assert!(config.headless);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "bucket = \"mirror-bucket\"\nretention_days = 7\nremoval_countdown_secs = 0\n\
             mirror_url = \"https://mirror.example/wintc\"\n",
        )
        .unwrap();

        let config = Config::load_with(&with_home(temp.path()), lookup_from(&[])).unwrap();
        assert_eq!(config.bucket, "mirror-bucket");
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.removal_countdown_secs, 0);
        assert_eq!(config.mirror_url.as_deref(), Some("https://mirror.example/wintc"));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "retention_days = \"soon\"").unwrap();

        let err = Config::load_with(&with_home(temp.path()), lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn other_user_domain_is_not_org_identity() {
        let temp = tempfile::tempdir().unwrap();
        let config =
            Config::load_with(&with_home(temp.path()), lookup_from(&[("USERDOMAIN", "CORP")]))
                .unwrap();
        assert!(!config.org_identity_present());
    }

    #[test]
    fn vs_version_parse_rejects_unknown_years() {
        assert_eq!(VsVersion::parse("2015").unwrap(), VsVersion::Vs2015);
        assert_eq!(VsVersion::Vs2015.cache_dir_name(), "vs_files");
        assert_eq!(VsVersion::Vs2013.cache_dir_name(), "vs2013_files");
        assert!(VsVersion::parse("2017").is_err());
    }
}
