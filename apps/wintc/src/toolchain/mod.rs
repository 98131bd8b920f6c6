//! Toolchain cache management.
//!
//! ## Module Structure
//!
//! - [`paths`] - Home, cache root, sidecar and info file locations
//! - [`hash`] - File enumeration and SHA-1 content digest
//! - [`sidecar`] - Persisted file list and mtimes for fast re-validation
//! - [`cache`] - Installed hashes, acquisition and verification
//! - [`gc`] - Eviction of orphaned, stray and expired versions
//! - [`source`] - Archive transports (`gsutil`, HTTPS mirror, local zip)
//! - [`access`] - Access probes run before downloading
//! - [`archive`] - ZIP extraction preserving paths and timestamps
//! - [`info`] - Combined `data.json` for build orchestration
//! - [`platform`] - Host detection and Universal CRT mapping
//! - [`doctor`] - Health checks

pub mod access;
pub mod archive;
pub mod cache;
pub mod doctor;
pub mod gc;
pub mod hash;
pub mod info;
pub mod paths;
pub mod platform;
pub mod sidecar;
pub mod source;

pub use access::SystemProbes;
pub use cache::{AcquireOutcome, ToolchainCache};
pub use gc::{EvictionPolicy, evict_unused, remove_version};
pub use info::ToolchainInfo;
pub use paths::CachePaths;
pub use platform::{Platform, RegistryProbe};
