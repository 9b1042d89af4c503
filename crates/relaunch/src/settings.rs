use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use relaunch_core::{DEFAULT_API_BASE, ReleaseStrategy, UpdateConfig, Version};
use relaunch_platform::logging::DEFAULT_MAX_LOG_SIZE;
use relaunch_platform::{AppPaths, DEFAULT_TOKEN_ENV_VAR, github_token};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default)]
    pub strategy: ReleaseStrategy,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_token_env_var")]
    pub token_env_var: String,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_true")]
    pub check_on_start: bool,
}

fn default_owner() -> String {
    "relaunch-app".to_string()
}

fn default_repo() -> String {
    "relaunch".to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_api_timeout() -> u64 {
    15
}

fn default_download_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_token_env_var() -> String {
    DEFAULT_TOKEN_ENV_VAR.to_string()
}

fn default_max_log_size_bytes() -> u64 {
    DEFAULT_MAX_LOG_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            strategy: ReleaseStrategy::default(),
            api_base_url: default_api_base_url(),
            api_timeout_secs: default_api_timeout(),
            download_timeout_secs: default_download_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            token_env_var: default_token_env_var(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            check_on_start: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AppSettings {
    /// Read settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed;
    /// callers fall back to the defaults after logging it.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Launcher settings for an installation at `install_dir` running
    /// `current_version`. The access token is read from the configured
    /// environment variable.
    pub fn update_config(
        &self,
        current_version: Version,
        install_dir: PathBuf,
        staging_root: PathBuf,
    ) -> UpdateConfig {
        let mut config = UpdateConfig::new(current_version, &self.owner, &self.repo, install_dir);
        config.strategy = self.strategy;
        config.api_base.clone_from(&self.api_base_url);
        config.token = github_token(&self.token_env_var);
        config.api_timeout = Duration::from_secs(self.api_timeout_secs);
        config.download_timeout = Duration::from_secs(self.download_timeout_secs);
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        config.staging_root = staging_root;
        config
    }
}
