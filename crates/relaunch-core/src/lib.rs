//! Update orchestration for Relaunch.
//!
//! This crate holds everything between "is there a newer release?" and "the
//! new build is running":
//! - Version parsing and ordering.
//! - Release discovery through the hosting API (latest release or tags).
//! - Artifact download and staging (release assets or source archive).
//! - Spawning the detached updater and handing it the staging directory.
//! - The updater's copy, verify, cleanup, and relaunch steps.

pub mod apply;
mod fetch;
mod handoff;
mod launcher;
mod release;
mod version;

/// Artifact download and staging.
pub use fetch::{ArtifactFetcher, CONTENT_DIR, FetchError, FetchProgress, extract_stripped};
/// Typed process-argument contract between launcher and updater.
pub use handoff::UpdaterHandoff;
/// Update check and updater spawn sequencing.
pub use launcher::{
    LaunchError, LaunchPhase, ProcessSpawner, SpawnUpdater, UpdateConfig, UpdateLauncher,
    UpdateOutcome, cleanup_stale_staging, exit_for_update,
};
/// Hosting API release discovery.
pub use release::{
    DEFAULT_API_BASE, ReleaseAsset, ReleaseInfo, ReleaseResolver, ReleaseStrategy, ResolveError,
    http_client,
};
/// Dotted numeric versions with semantic-version precedence.
pub use version::{Version, VersionError, is_newer_version};
