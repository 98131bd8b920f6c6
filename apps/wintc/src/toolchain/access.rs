//! Access checks performed before any download.
//!
//! Three independent signals decide whether fetching can proceed:
//!
//! | bucket reachable | source control or org identity | result |
//! |---|---|---|
//! | yes | any | proceed |
//! | no | at least one | [`WintcError::AuthenticationRequired`] |
//! | no | neither | [`WintcError::AccessDenied`] |

use std::process::{Command, Stdio};

use anyhow::Result;
use tracing::debug;

use super::source::ArchiveSource;
use crate::config::Config;
use crate::errors::WintcError;

/// Probes for the access signals that do not depend on the archive source.
pub trait AccessProbes {
    /// Whether the internal source-control host answers without prompting.
    fn source_control_reachable(&self) -> bool;

    /// Whether the user appears to belong to the organisation.
    fn org_identity_present(&self) -> bool;
}

/// Probes backed by `git` and the captured user domain.
#[derive(Debug, Clone)]
pub struct SystemProbes {
    source_control_url: String,
    org_identity: bool,
}

impl SystemProbes {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_control_url: config.source_control_url.clone(),
            org_identity: config.org_identity_present(),
        }
    }
}

impl AccessProbes for SystemProbes {
    fn source_control_reachable(&self) -> bool {
        let Ok(git) = which::which("git") else {
            debug!("git not found in PATH");
            return false;
        };
        // askpass=true makes git fail instead of prompting for credentials.
        Command::new(git)
            .args(["-c", "core.askpass=true", "remote", "show"])
            .arg(&self.source_control_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn org_identity_present(&self) -> bool {
        self.org_identity
    }
}

/// Decides whether `source` may be fetched from.
///
/// Sources that do not require an access check always pass.
///
/// # Errors
///
/// Returns [`WintcError::AuthenticationRequired`] or
/// [`WintcError::AccessDenied`] per the table in the module docs.
pub fn check_access(source: &dyn ArchiveSource, probes: &dyn AccessProbes) -> Result<()> {
    if !source.requires_access_check() {
        return Ok(());
    }

    if source.is_reachable() {
        debug!(source = %source.describe(), "archive store reachable");
        return Ok(());
    }

    let source_control = probes.source_control_reachable();
    let org_identity = probes.org_identity_present();
    debug!(source_control, org_identity, "archive store unreachable");

    if source_control || org_identity {
        Err(WintcError::authentication_required(source.describe()).into())
    } else {
        Err(WintcError::AccessDenied.into())
    }
}
