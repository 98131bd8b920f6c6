//! Command implementations for the wintc CLI.
//!
//! ## Commands
//!
//! - [`ensure`] - Install a toolchain by hash and write `data.json`
//! - [`list`] - Show installed toolchains
//! - [`hash`] - Print the content hash of an installed toolchain
//! - [`gc`] - Remove orphaned, stray and expired toolchains
//! - [`remove`] - Remove a single toolchain
//! - [`doctor`] - Check cache health and archive access

pub mod doctor;
pub mod ensure;
pub mod gc;
pub mod hash;
pub mod list;
pub mod remove;
