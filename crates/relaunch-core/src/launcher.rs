use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, info, warn};
use relaunch_platform::{
    Detach, MAIN_EXECUTABLE, STAGING_PREFIX, UPDATER_EXECUTABLE, is_staging_dir_name,
};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::fetch::{ArtifactFetcher, FetchProgress};
use crate::handoff::UpdaterHandoff;
use crate::release::{
    DEFAULT_API_BASE, ReleaseInfo, ReleaseResolver, ReleaseStrategy, ResolveError, http_client,
};
use crate::version::Version;

/// Construction-time settings for one [`UpdateLauncher`].
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub current_version: Version,
    pub owner: String,
    pub repo: String,
    pub strategy: ReleaseStrategy,
    pub api_base: String,
    pub token: Option<String>,
    pub api_timeout: Duration,
    pub download_timeout: Duration,
    pub connect_timeout: Duration,
    pub main_asset: String,
    pub updater_asset: String,
    pub staging_root: PathBuf,
    pub install_dir: PathBuf,
    pub updater_path: PathBuf,
}

impl UpdateConfig {
    pub fn new(
        current_version: Version,
        owner: impl Into<String>,
        repo: impl Into<String>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        let install_dir = install_dir.into();
        Self {
            current_version,
            owner: owner.into(),
            repo: repo.into(),
            strategy: ReleaseStrategy::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            api_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            main_asset: MAIN_EXECUTABLE.to_string(),
            updater_asset: UPDATER_EXECUTABLE.to_string(),
            staging_root: std::env::temp_dir(),
            updater_path: install_dir.join(UPDATER_EXECUTABLE),
            install_dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Checking,
    Fetching,
    Spawning,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::Fetching => "fetching",
            Self::Spawning => "spawning",
        };
        f.write_str(name)
    }
}

/// Result of [`UpdateLauncher::check_and_launch`].
///
/// After `Launched` the caller must release its resources and call
/// [`exit_for_update`]. After `Failed` the installation is untouched and the
/// application keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoUpdate,
    Launched { version: Version },
    Failed { phase: LaunchPhase, details: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to create staging directory under {}: {source}", root.display())]
    Staging {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn updater {}: {source}", updater.display())]
    Spawn {
        updater: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Starts the updater process for a staged update.
pub trait SpawnUpdater {
    /// Called before anything is downloaded; an error aborts the update.
    ///
    /// # Errors
    /// Returns an error when the updater cannot possibly be started.
    fn preflight(&self) -> Result<(), LaunchError> {
        Ok(())
    }

    /// Start the updater without waiting for it.
    ///
    /// # Errors
    /// Returns an error when the process cannot be started.
    fn spawn(&self, handoff: &UpdaterHandoff) -> Result<(), LaunchError>;
}

/// Spawns the installed updater binary as a detached process.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    updater: PathBuf,
    working_dir: PathBuf,
}

impl ProcessSpawner {
    pub fn new(updater: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            updater: updater.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl SpawnUpdater for ProcessSpawner {
    fn preflight(&self) -> Result<(), LaunchError> {
        if self.updater.is_file() {
            return Ok(());
        }
        Err(LaunchError::Spawn {
            updater: self.updater.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "updater binary not found"),
        })
    }

    fn spawn(&self, handoff: &UpdaterHandoff) -> Result<(), LaunchError> {
        let child = Command::new(&self.updater)
            .args(handoff.to_args())
            .current_dir(&self.working_dir)
            .detach()
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                updater: self.updater.clone(),
                source,
            })?;
        info!(
            "Spawned updater {} (pid {})",
            self.updater.display(),
            child.id()
        );
        Ok(())
    }
}

/// Runs the live application's side of an update: check, stage, hand off.
pub struct UpdateLauncher<S = ProcessSpawner> {
    config: UpdateConfig,
    resolver: ReleaseResolver,
    fetcher: ArtifactFetcher,
    spawner: S,
}

impl UpdateLauncher<ProcessSpawner> {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: UpdateConfig) -> Result<Self, reqwest::Error> {
        let spawner = ProcessSpawner::new(&config.updater_path, &config.install_dir);
        Self::with_spawner(config, spawner)
    }
}

impl<S: SpawnUpdater> UpdateLauncher<S> {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_spawner(config: UpdateConfig, spawner: S) -> Result<Self, reqwest::Error> {
        let client = http_client(config.connect_timeout)?;
        let resolver = ReleaseResolver::new(client.clone(), &config.owner, &config.repo)
            .with_api_base(&config.api_base)
            .with_token(config.token.clone())
            .with_timeout(config.api_timeout);
        let fetcher = ArtifactFetcher::new(client, &config.repo)
            .with_asset_names(&config.main_asset, &config.updater_asset)
            .with_token(config.token.clone())
            .with_timeout(config.download_timeout);

        Ok(Self {
            config,
            resolver,
            fetcher,
            spawner,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::Sender<FetchProgress>) -> Self {
        self.fetcher = self.fetcher.with_progress(progress);
        self
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Resolve the newest remote version and return it if it is newer than
    /// the running one. Nothing is downloaded.
    ///
    /// # Errors
    /// Returns the resolver's error when the check itself fails.
    pub async fn check(&self) -> Result<Option<ReleaseInfo>, ResolveError> {
        let release = self.resolver.resolve_latest(self.config.strategy).await?;
        if release.version > self.config.current_version {
            info!(
                "Update available: {} -> {}",
                self.config.current_version, release.version
            );
            Ok(Some(release))
        } else {
            debug!(
                "Up to date: running {}, newest is {}",
                self.config.current_version, release.version
            );
            Ok(None)
        }
    }

    /// Check for a newer version and, if there is one, stage it and spawn the
    /// updater. Never panics or propagates errors; failures become
    /// [`UpdateOutcome::Failed`].
    pub async fn check_and_launch(&self) -> UpdateOutcome {
        info!(
            "Checking {}/{} for updates (running {})",
            self.config.owner, self.config.repo, self.config.current_version
        );
        match self.check().await {
            Ok(Some(release)) => self.launch(&release).await,
            Ok(None) => UpdateOutcome::NoUpdate,
            Err(error) => failed(LaunchPhase::Checking, &error),
        }
    }

    /// Stage `release` and spawn the updater for it.
    pub async fn launch(&self, release: &ReleaseInfo) -> UpdateOutcome {
        if let Err(error) = self.spawner.preflight() {
            return failed(LaunchPhase::Spawning, &error);
        }

        let staging = match create_staging_dir(&self.config.staging_root) {
            Ok(staging) => staging,
            Err(error) => return failed(LaunchPhase::Fetching, &error),
        };
        info!("Staging {} in {}", release.tag, staging.display());

        let content_root = match self.fetcher.fetch(release, &staging).await {
            Ok(root) => root,
            Err(error) => {
                discard_staging(&staging);
                return failed(LaunchPhase::Fetching, &error);
            }
        };

        let handoff = UpdaterHandoff::new(content_root, &self.config.install_dir);
        if let Err(error) = self.spawner.spawn(&handoff) {
            discard_staging(&staging);
            return failed(LaunchPhase::Spawning, &error);
        }

        UpdateOutcome::Launched {
            version: release.version.clone(),
        }
    }
}

fn failed(phase: LaunchPhase, error: &dyn std::error::Error) -> UpdateOutcome {
    warn!("Update {phase} failed: {error}");
    UpdateOutcome::Failed {
        phase,
        details: error.to_string(),
    }
}

fn create_staging_dir(root: &Path) -> Result<PathBuf, LaunchError> {
    let staging_error = |source: std::io::Error| LaunchError::Staging {
        root: root.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(root).map_err(staging_error)?;
    let dir = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(staging_error)?;
    Ok(dir.keep())
}

fn discard_staging(staging: &Path) {
    if let Err(error) = std::fs::remove_dir_all(staging) {
        warn!(
            "Failed to remove staging directory {}: {error}",
            staging.display()
        );
    }
}

/// Remove staging directories left behind by earlier runs. Returns how many
/// were removed.
pub fn cleanup_stale_staging(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(is_staging_dir_name);
        if !is_staging || !path.is_dir() {
            continue;
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!("Removed stale staging directory {}", path.display());
                removed += 1;
            }
            Err(error) => warn!(
                "Failed to remove stale staging directory {}: {error}",
                path.display()
            ),
        }
    }
    removed
}

/// Terminate the application right after a successful handoff.
///
/// Skips destructors and unwinding so nothing during shutdown can keep the
/// old process alive while the updater waits for it.
pub fn exit_for_update() -> ! {
    info!("Exiting for update");
    log::logger().flush();
    std::process::exit(0)
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdate => f.write_str("no update available"),
            Self::Launched { version } => write!(f, "updater launched for {version}"),
            Self::Failed { phase, details } => write!(f, "update failed while {phase}: {details}"),
        }
    }
}
