#![warn(clippy::pedantic)]

//! # Windows Toolchain Cache (wintc)
//!
//! `wintc` keeps a content-addressed cache of prebuilt Windows build
//! toolchains. Each installed version lives in a directory named by the SHA-1
//! of its contents. `wintc` installs the version a build asks for, verifies
//! it, writes the combined `data.json` that build scripts read, and removes
//! versions that are orphaned or unused for longer than the retention window.
//!
//! ## Subcommands
//!
//! - `ensure` - Install a toolchain by hash if needed and record it as active
//! - `list` - List installed toolchains
//! - `hash` - Print the content hash of an installed toolchain
//! - `gc` - Remove orphaned, stray and expired toolchains
//! - `remove` - Remove one toolchain
//! - `doctor` - Check cache health and archive access
//!
//! ## Headless Mode (`--headless`)
//!
//! Skips the countdown shown before a toolchain is removed. Setting
//! `CHROME_HEADLESS=1` has the same effect.
//!
//! ## Examples
//!
//! ```bash
//! wintc ensure 4087e065abebdca6dbd0caca2910c6718d2ec67f
//! wintc --vs-version 2015 list
//! RUST_LOG=wintc=debug wintc gc --dry-run
//! ```

mod commands;
mod config;
mod errors;
mod toolchain;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{doctor, ensure, gc, hash, list, remove};
use config::{Config, Overrides, VsVersion};
use errors::WintcError;
use std::path::PathBuf;

/// Windows toolchain fetch, cache and cleanup tool.
#[derive(Parser)]
#[command(
    name = "wintc",
    author,
    version,
    about = "Fetch, verify and clean up prebuilt Windows toolchains",
    after_help = "\
ENVIRONMENT VARIABLES:
    WINTC_HOME              Cache home directory (default: ~/.wintc)
    CHROME_HEADLESS=1       Same as --headless
    GYP_MSVS_VERSION        2015 selects the vs_files cache root
    USE_LOCAL_ZIP=1         Read <hash>.zip from the home directory
    USERDOMAIN              Compared with the organisation domain for access checks
    RUST_LOG                Log filter (default: warn)"
)]
pub struct Cli {
    /// Skip interactive countdowns.
    #[clap(long = "headless", global = true, action = clap::ArgAction::SetTrue)]
    pub headless: bool,

    /// Cache home directory.
    #[clap(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Visual Studio generation whose cache root is used.
    #[clap(long, global = true, value_name = "YEAR", value_parser = ["2013", "2015"])]
    pub vs_version: Option<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the wintc CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a toolchain by hash if needed and record it as active.
    ///
    /// Downloads `<hash>.zip`, extracts it into the cache root, verifies the
    /// content hash and writes data.json. Unused toolchains are removed
    /// afterwards. Does nothing on non-Windows hosts unless --force is given.
    Ensure(ensure::EnsureArgs),

    /// List installed toolchains.
    ///
    /// Shows the sidecar state and last use of every installed toolchain and
    /// marks the active one.
    List,

    /// Print the content hash of an installed toolchain.
    Hash(hash::HashArgs),

    /// Remove orphaned, stray and expired toolchains.
    Gc(gc::GcArgs),

    /// Remove a single toolchain.
    Remove(remove::RemoveArgs),

    /// Check cache health and archive access.
    Doctor,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error with any follow-up guidance and returns the exit code.
///
/// Every failure exits with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    if let Some(guidance) = e.downcast_ref::<WintcError>().and_then(WintcError::guidance) {
        eprintln!();
        eprintln!("{guidance}");
    }
    1
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        home: cli.home,
        vs_version: cli.vs_version.as_deref().map(VsVersion::parse).transpose()?,
        headless: cli.headless,
    };
    let config = Config::load(&overrides)?;

    match cli.command {
        Commands::Ensure(args) => ensure::execute(&args, &config),
        Commands::List => list::execute(&config),
        Commands::Hash(args) => hash::execute(&args, &config),
        Commands::Gc(args) => gc::execute(&args, &config),
        Commands::Remove(args) => remove::execute(&args, &config),
        Commands::Doctor => doctor::execute(&config),
    }
}
