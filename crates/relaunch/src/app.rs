//! Start-up update flow: clear stale staging, check, ask, hand off.

use std::path::PathBuf;

use log::{debug, info, warn};
use relaunch_core::{
    FetchProgress, ReleaseInfo, UpdateLauncher, UpdateOutcome, Version, cleanup_stale_staging,
};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::prompt::UpdatePrompt;
use crate::settings::AppSettings;

/// What the application should do once the start-up check is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupAction {
    Continue,
    /// The updater is running; the process must exit now.
    ExitForUpdate,
}

pub struct App<P> {
    settings: AppSettings,
    current_version: Version,
    install_dir: PathBuf,
    staging_root: PathBuf,
    prompt: P,
}

impl<P: UpdatePrompt> App<P> {
    pub fn new(
        settings: AppSettings,
        current_version: Version,
        install_dir: PathBuf,
        staging_root: PathBuf,
        prompt: P,
    ) -> Self {
        Self {
            settings,
            current_version,
            install_dir,
            staging_root,
            prompt,
        }
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Run the start-up update check. With `check_only` the user is told
    /// about a newer version but nothing is downloaded.
    ///
    /// Check and download failures are logged and reported through the
    /// prompt; the application keeps running.
    ///
    /// # Errors
    /// Returns an error only if the HTTP client cannot be built.
    pub async fn startup_update(&mut self, check_only: bool) -> Result<StartupAction, AppError> {
        let removed = cleanup_stale_staging(&self.staging_root);
        if removed > 0 {
            info!("Removed {removed} stale staging director(ies)");
        }

        let config = self.settings.update_config(
            self.current_version.clone(),
            self.install_dir.clone(),
            self.staging_root.clone(),
        );
        let (progress_tx, progress_rx) = mpsc::channel(32);
        let launcher = UpdateLauncher::new(config)?.with_progress(progress_tx);
        let progress_task = tokio::spawn(log_progress(progress_rx));

        let action = match launcher.check().await {
            Ok(Some(release)) => self.offer(&launcher, &release, check_only).await,
            Ok(None) => {
                info!("Running the newest version ({})", self.current_version);
                StartupAction::Continue
            }
            Err(error) => {
                warn!("Update check failed: {error}");
                StartupAction::Continue
            }
        };

        drop(launcher);
        let _ = progress_task.await;
        Ok(action)
    }

    async fn offer(
        &mut self,
        launcher: &UpdateLauncher,
        release: &ReleaseInfo,
        check_only: bool,
    ) -> StartupAction {
        self.prompt.notify_update_available(
            &self.current_version.to_string(),
            &release.version.to_string(),
        );
        if check_only {
            return StartupAction::Continue;
        }
        if !self.prompt.confirm_update() {
            info!("Update to {} declined", release.version);
            return StartupAction::Continue;
        }

        match launcher.launch(release).await {
            UpdateOutcome::Launched { version } => {
                info!("Updater started for {version}");
                StartupAction::ExitForUpdate
            }
            UpdateOutcome::NoUpdate => StartupAction::Continue,
            UpdateOutcome::Failed { phase, details } => {
                self.prompt.update_failed(&format!("{phase}: {details}"));
                StartupAction::Continue
            }
        }
    }
}

async fn log_progress(mut progress: mpsc::Receiver<FetchProgress>) {
    while let Some(event) = progress.recv().await {
        match event {
            FetchProgress::Downloading {
                name,
                downloaded,
                total,
            } => debug!("Downloading {name}: {downloaded}/{total} bytes"),
            FetchProgress::Extracting => debug!("Extracting source archive"),
            FetchProgress::Staged(root) => info!("Update staged in {}", root.display()),
        }
    }
}
