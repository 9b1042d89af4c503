use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use relaunch_platform::{MAIN_EXECUTABLE, UPDATER_EXECUTABLE, set_executable};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::release::{ReleaseAsset, ReleaseInfo};

/// Directory inside a staging directory that receives extracted archive
/// content.
pub const CONTENT_DIR: &str = "content";

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchProgress {
    Downloading {
        name: String,
        downloaded: u64,
        total: u64,
    },
    Extracting,
    Staged(PathBuf),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{context}: {source}")]
    Download {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    DownloadStatus { url: String, status: StatusCode },
    #[error("malformed archive: {context}")]
    ArchiveFormat {
        context: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    fn download(context: &'static str, source: reqwest::Error) -> Self {
        Self::Download { context, source }
    }

    fn archive(context: impl Into<String>, source: Option<zip::result::ZipError>) -> Self {
        Self::ArchiveFormat {
            context: context.into(),
            source,
        }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

/// Downloads a release into a staging directory.
///
/// A release asset named like the main executable wins; the source archive
/// is only used when no such asset exists.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
    token: Option<String>,
    timeout: Duration,
    main_asset: String,
    updater_asset: String,
    archive_stem: String,
    progress: Option<mpsc::Sender<FetchProgress>>,
}

impl ArtifactFetcher {
    /// `archive_stem` names the downloaded source archive
    /// (`{archive_stem}-{version}.zip`), usually the repository name.
    pub fn new(client: reqwest::Client, archive_stem: impl Into<String>) -> Self {
        Self {
            client,
            token: None,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            main_asset: MAIN_EXECUTABLE.to_string(),
            updater_asset: UPDATER_EXECUTABLE.to_string(),
            archive_stem: archive_stem.into(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_asset_names(
        mut self,
        main_asset: impl Into<String>,
        updater_asset: impl Into<String>,
    ) -> Self {
        self.main_asset = main_asset.into();
        self.updater_asset = updater_asset.into();
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.is_empty());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::Sender<FetchProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Stage `release` under `staging_dir` and return the content root: the
    /// directory whose layout mirrors the installation directory.
    ///
    /// # Errors
    /// Returns an error when a download fails or times out, when the archive
    /// is malformed or empty, or when writing to `staging_dir` fails.
    pub async fn fetch(
        &self,
        release: &ReleaseInfo,
        staging_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let content_root = match release.asset(&self.main_asset) {
            Some(main) => self.fetch_assets(release, main, staging_dir).await?,
            None => self.fetch_source_archive(release, staging_dir).await?,
        };
        self.report(FetchProgress::Staged(content_root.clone())).await;
        Ok(content_root)
    }

    async fn fetch_assets(
        &self,
        release: &ReleaseInfo,
        main: &ReleaseAsset,
        staging_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        info!("Downloading release asset {}", main.name);
        let main_path = staging_dir.join(&self.main_asset);
        self.download_file(&main.download_url, &self.main_asset, &main_path)
            .await?;
        set_executable(&main_path).map_err(|error| {
            FetchError::io_with_path("failed to mark asset executable", &main_path, &error)
        })?;

        if let Some(updater) = release.asset(&self.updater_asset) {
            let updater_path = staging_dir.join(&self.updater_asset);
            let staged = self
                .download_file(&updater.download_url, &self.updater_asset, &updater_path)
                .await
                .and_then(|()| {
                    set_executable(&updater_path).map_err(|error| {
                        FetchError::io_with_path(
                            "failed to mark asset executable",
                            &updater_path,
                            &error,
                        )
                    })
                });
            if let Err(error) = staged {
                warn!("Skipping companion updater asset: {error}");
                let _ = std::fs::remove_file(&updater_path);
            }
        }

        Ok(staging_dir.to_path_buf())
    }

    async fn fetch_source_archive(
        &self,
        release: &ReleaseInfo,
        staging_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let file_name = format!("{}-{}.zip", self.archive_stem, release.version);
        let archive_path = staging_dir.join(&file_name);

        info!(
            "No {} asset in {}, downloading source archive",
            self.main_asset, release.tag
        );
        self.download_file(&release.source_archive_url, &file_name, &archive_path)
            .await?;

        self.report(FetchProgress::Extracting).await;
        let content_root = staging_dir.join(CONTENT_DIR);
        extract_stripped(&archive_path, &content_root)?;
        Ok(content_root)
    }

    async fn report(&self, progress: FetchProgress) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(progress).await;
        }
    }

    async fn download_file(&self, url: &str, name: &str, dest: &Path) -> Result<(), FetchError> {
        use futures_util::StreamExt;

        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|error| FetchError::download("download request failed", error))?;

        if !response.status().is_success() {
            return Err(FetchError::DownloadStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;

        let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
            FetchError::io_with_path("failed to create download file", dest, &error)
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| FetchError::download("download stream error", error))?;
            file.write_all(&chunk).await.map_err(|error| {
                FetchError::io_with_path("failed to write download data", dest, &error)
            })?;
            downloaded += chunk.len() as u64;
            self.report(FetchProgress::Downloading {
                name: name.to_string(),
                downloaded,
                total,
            })
            .await;
        }

        file.flush().await.map_err(|error| {
            FetchError::io_with_path("failed to flush download file", dest, &error)
        })?;

        info!("Downloaded {name}: {downloaded} bytes");
        Ok(())
    }
}

/// Extract `zip_path` into `dest`, dropping the first path segment of every
/// entry.
///
/// Hosting services wrap source archives in one synthetic top-level directory
/// (`repo-v1.2.3/...`); entries consisting only of that segment are skipped.
/// Returns the number of files written.
///
/// # Errors
/// Returns an error if the archive cannot be read, has no entries, has
/// nothing below its top-level directory, or a file cannot be written.
pub fn extract_stripped(zip_path: &Path, dest: &Path) -> Result<usize, FetchError> {
    let file = std::fs::File::open(zip_path)
        .map_err(|error| FetchError::io_with_path("failed to open zip file", zip_path, &error))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| FetchError::archive("failed to read zip archive", Some(error)))?;

    if archive.len() == 0 {
        return Err(FetchError::archive("archive has no top-level entry", None));
    }

    std::fs::create_dir_all(dest).map_err(|error| {
        FetchError::io_with_path("failed to create extraction directory", dest, &error)
    })?;

    let mut materialized = 0_usize;
    let mut files = 0_usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| FetchError::archive("failed to read zip entry", Some(error)))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };

        let mut components = name.components();
        components.next();
        let relative = components.as_path();
        if relative.as_os_str().is_empty() {
            debug!("Skipping archive root {}", name.display());
            continue;
        }
        let out_path = dest.join(relative);
        materialized += 1;

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                FetchError::io_with_path("failed to create extraction directory", &out_path, &error)
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                FetchError::io_with_path(
                    "failed to create extraction parent directory",
                    parent,
                    &error,
                )
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
            FetchError::io_with_path("failed to create extracted file", &out_path, &error)
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            FetchError::io_with_path("failed to extract archive entry", &out_path, &error)
        })?;
        files += 1;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    if materialized == 0 {
        return Err(FetchError::archive(
            "archive has nothing below its top-level directory",
            None,
        ));
    }

    debug!("Extracted {files} file(s) to {}", dest.display());
    Ok(files)
}
