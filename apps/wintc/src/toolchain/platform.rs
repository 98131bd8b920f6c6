//! Host platform detection.
//!
//! The prebuilt toolchain only makes sense on Windows hosts, so the host OS
//! decides whether `ensure` does anything. The Windows release decides which
//! Universal CRT update package applies; it is read through
//! [`PlatformProbe`] so the mapping stays testable off Windows.

use std::fmt;

/// Operating system wintc is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    /// Any other host, named by `std::env::consts::OS`.
    Other(&'static str),
}

impl Platform {
    /// Detects the current platform based on compile-time configuration.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other(std::env::consts::OS)
        }
    }

    #[must_use]
    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Other(os) => write!(f, "{os}"),
        }
    }
}

/// Windows release, from the registry `CurrentVersion` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowsRelease {
    /// `6.1`
    Windows7,
    /// `6.2`
    Windows8,
    /// `6.3`
    Windows81,
    /// Anything else.
    Other(String),
}

impl WindowsRelease {
    /// Classifies a `CurrentVersion` string.
    #[must_use]
    pub fn from_current_version(version: &str) -> Self {
        match version.trim() {
            "6.1" => Self::Windows7,
            "6.2" => Self::Windows8,
            "6.3" => Self::Windows81,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for WindowsRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows7 => write!(f, "Windows 7 (6.1)"),
            Self::Windows8 => write!(f, "Windows 8 (6.2)"),
            Self::Windows81 => write!(f, "Windows 8.1 (6.3)"),
            Self::Other(v) if v.is_empty() => write!(f, "unknown"),
            Self::Other(v) => write!(f, "Windows NT {v}"),
        }
    }
}

/// Source of the Windows release tag.
pub trait PlatformProbe {
    /// Raw `CurrentVersion` value, or `None` when unavailable.
    fn current_version(&self) -> Option<String>;

    fn windows_release(&self) -> Option<WindowsRelease> {
        self.current_version()
            .map(|v| WindowsRelease::from_current_version(&v))
    }
}

/// Reads `HKLM\Software\Microsoft\Windows NT\CurrentVersion`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryProbe;

impl PlatformProbe for RegistryProbe {
    #[cfg(windows)]
    fn current_version(&self) -> Option<String> {
        use winreg::RegKey;
        use winreg::enums::HKEY_LOCAL_MACHINE;

        RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey(r"Software\Microsoft\Windows NT\CurrentVersion")
            .and_then(|key| key.get_value::<String, _>("CurrentVersion"))
            .ok()
    }

    #[cfg(not(windows))]
    fn current_version(&self) -> Option<String> {
        None
    }
}

/// Universal CRT update package for `release`, if one is needed.
#[must_use]
pub fn ucrt_installer_name(release: &WindowsRelease) -> Option<&'static str> {
    match release {
        WindowsRelease::Windows7 => Some("Windows6.1-KB2999226-x64.msu"),
        WindowsRelease::Windows8 => Some("Windows8-RT-KB2999226-x64.msu"),
        WindowsRelease::Windows81 => Some("Windows8.1-KB2999226-x64.msu"),
        WindowsRelease::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl PlatformProbe for Fixed {
        fn current_version(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn detect_matches_build_target() {
        let platform = Platform::detect();
        assert_eq!(platform.is_windows(), cfg!(windows));
    }

    #[test]
    fn installer_names_per_release() {
        let name = |v| ucrt_installer_name(&WindowsRelease::from_current_version(v));
        assert_eq!(name("6.1"), Some("Windows6.1-KB2999226-x64.msu"));
        assert_eq!(name("6.2"), Some("Windows8-RT-KB2999226-x64.msu"));
        assert_eq!(name("6.3"), Some("Windows8.1-KB2999226-x64.msu"));
        assert_eq!(name("10.0"), None);
    }

    #[test]
    fn probe_maps_raw_value_to_release() {
        assert_eq!(Fixed(Some("6.3")).windows_release(), Some(WindowsRelease::Windows81));
        assert_eq!(
            Fixed(Some(" 6.1 ")).windows_release(),
            Some(WindowsRelease::Windows7)
        );
        assert_eq!(Fixed(None).windows_release(), None);
    }

    #[test]
    fn release_display() {
        assert_eq!(WindowsRelease::Windows8.to_string(), "Windows 8 (6.2)");
        assert_eq!(
            WindowsRelease::Other("10.0".into()).to_string(),
            "Windows NT 10.0"
        );
    }
}
