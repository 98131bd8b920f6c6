//! Build script for the wintc CLI.
//!
//! Embeds the short git commit so `wintc doctor` can report which build is
//! managing the cache.

use std::process::Command;

fn main() {
    let commit = git_output(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=WINTC_GIT_COMMIT={commit}");

    if let Some(top) = git_output(&["rev-parse", "--show-toplevel"]) {
        println!("cargo:rerun-if-changed={top}/.git/HEAD");
    }
}

/// Runs git with `args` and returns trimmed stdout when it succeeds with output.
fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
