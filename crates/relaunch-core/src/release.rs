use std::time::Duration;

use log::{debug, info};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{Version, VersionError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);
const GITHUB_JSON: &str = "application/vnd.github+json";
const TAGS_PER_PAGE: u32 = 100;

/// Where the newest version is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStrategy {
    /// Highest parseable version among all tags.
    Tags,
    /// The record behind `releases/latest`.
    #[default]
    LatestRelease,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

/// Snapshot of the newest remote version, built once per check.
#[derive(Debug, Clone)]
pub struct ReleaseInfo {
    pub tag: String,
    pub version: Version,
    pub assets: Vec<ReleaseAsset>,
    pub source_archive_url: String,
}

impl ReleaseInfo {
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

#[derive(Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    zipball_url: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Deserialize)]
struct GitHubTag {
    name: String,
    #[serde(default)]
    zipball_url: Option<String>,
    commit: GitHubCommitRef,
}

#[derive(Deserialize)]
struct GitHubCommitRef {
    sha: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{context}: {source}")]
    Network {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}{body_snippet}")]
    Status {
        url: String,
        status: StatusCode,
        body_snippet: String,
    },
    #[error("no release found at {url}")]
    NotFound { url: String },
    #[error("repository {owner}/{repo} has no tags")]
    EmptyRepository { owner: String, repo: String },
    #[error("tag {tag:?} is not a usable version: {source}")]
    InvalidVersion {
        tag: String,
        #[source]
        source: VersionError,
    },
    #[error("failed to parse {context}: {source}")]
    Parse {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ResolveError {
    /// Transport failures, timeouts, rate limiting, and other non-2xx
    /// responses.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }
}

/// Build the HTTP client shared by release resolution and downloads.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn http_client(connect_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(format!("relaunch/{}", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Read-only client for the hosting API's tag and release endpoints.
#[derive(Debug, Clone)]
pub struct ReleaseResolver {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: Option<String>,
    timeout: Duration,
}

impl ReleaseResolver {
    pub fn new(client: reqwest::Client, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            timeout: DEFAULT_API_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Attach a token to every request. `None` keeps requests anonymous.
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

    /// Resolve the newest remote version with the given strategy.
    ///
    /// # Errors
    /// Returns an error if the API is unreachable or answers with a non-2xx
    /// status, if nothing has been published, or if the newest release tag is
    /// not a version.
    pub async fn resolve_latest(
        &self,
        strategy: ReleaseStrategy,
    ) -> Result<ReleaseInfo, ResolveError> {
        match strategy {
            ReleaseStrategy::Tags => self.latest_tag().await,
            ReleaseStrategy::LatestRelease => self.latest_release().await,
        }
    }

    /// Fetch the single `releases/latest` record.
    ///
    /// # Errors
    /// See [`ReleaseResolver::resolve_latest`].
    pub async fn latest_release(&self) -> Result<ReleaseInfo, ResolveError> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.owner, self.repo
        );
        let release: GitHubRelease = self.fetch_json(&url, "latest release").await?;
        let version =
            Version::parse(&release.tag_name).map_err(|source| ResolveError::InvalidVersion {
                tag: release.tag_name.clone(),
                source,
            })?;

        info!(
            "Latest release of {}/{} is {} with {} asset(s)",
            self.owner,
            self.repo,
            release.tag_name,
            release.assets.len()
        );

        let source_archive_url = release
            .zipball_url
            .unwrap_or_else(|| self.zipball_url(&release.tag_name));
        Ok(ReleaseInfo {
            tag: release.tag_name,
            version,
            assets: release
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                })
                .collect(),
            source_archive_url,
        })
    }

    /// List tags and pick the one with the highest version.
    ///
    /// # Errors
    /// See [`ReleaseResolver::resolve_latest`].
    pub async fn latest_tag(&self) -> Result<ReleaseInfo, ResolveError> {
        let url = format!(
            "{}/repos/{}/{}/tags?per_page={TAGS_PER_PAGE}",
            self.api_base, self.owner, self.repo
        );
        let tags: Vec<GitHubTag> = self.fetch_json(&url, "tag list").await?;

        let Some(first) = tags.first() else {
            return Err(ResolveError::EmptyRepository {
                owner: self.owner.clone(),
                repo: self.repo.clone(),
            });
        };
        let first_name = first.name.clone();

        let newest = tags
            .into_iter()
            .filter_map(|tag| match Version::parse(&tag.name) {
                Ok(version) => Some((version, tag)),
                Err(error) => {
                    debug!("Skipping tag {}: {error}", tag.name);
                    None
                }
            })
            .max_by(|(a, _), (b, _)| a.cmp(b));

        let Some((version, tag)) = newest else {
            return Err(ResolveError::InvalidVersion {
                source: VersionError::InvalidFormat {
                    input: first_name.clone(),
                },
                tag: first_name,
            });
        };

        info!(
            "Newest tag of {}/{} is {} at {}",
            self.owner, self.repo, tag.name, tag.commit.sha
        );

        let source_archive_url = tag
            .zipball_url
            .unwrap_or_else(|| self.zipball_url(&tag.name));
        Ok(ReleaseInfo {
            tag: tag.name,
            version,
            assets: Vec::new(),
            source_archive_url,
        })
    }

    fn zipball_url(&self, tag: &str) -> String {
        format!(
            "{}/repos/{}/{}/zipball/{tag}",
            self.api_base, self.owner, self.repo
        )
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &'static str,
    ) -> Result<T, ResolveError> {
        let mut request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(ACCEPT, GITHUB_JSON);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ResolveError::Network { context, source })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(ResolveError::Status {
                url: url.to_string(),
                status,
                body_snippet,
            });
        }

        response
            .json()
            .await
            .map_err(|source| ResolveError::Parse { context, source })
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_snippet_truncates_and_prefixes() {
        assert_eq!(response_snippet("", 10), "");
        assert_eq!(response_snippet("rate limited", 4), ": rate");
    }

    #[test]
    fn strategy_uses_kebab_case_names() {
        let tags: ReleaseStrategy =
            serde_json::from_str("\"tags\"").expect("tags strategy should parse");
        let latest: ReleaseStrategy =
            serde_json::from_str("\"latest-release\"").expect("release strategy should parse");
        assert_eq!(tags, ReleaseStrategy::Tags);
        assert_eq!(latest, ReleaseStrategy::LatestRelease);
        assert_eq!(ReleaseStrategy::default(), ReleaseStrategy::LatestRelease);
    }

    #[test]
    fn network_classification_covers_status_errors() {
        let status = ResolveError::Status {
            url: "https://example.com".to_string(),
            status: StatusCode::FORBIDDEN,
            body_snippet: String::new(),
        };
        assert!(status.is_network());

        let empty = ResolveError::EmptyRepository {
            owner: "o".to_string(),
            repo: "r".to_string(),
        };
        assert!(!empty.is_network());
    }

    #[test]
    fn with_api_base_trims_trailing_slash() {
        let resolver = ReleaseResolver::new(reqwest::Client::new(), "owner", "repo")
            .with_api_base("http://localhost:1234/");
        assert_eq!(
            resolver.zipball_url("v1.0.0"),
            "http://localhost:1234/repos/owner/repo/zipball/v1.0.0"
        );
    }

    #[test]
    fn empty_token_is_treated_as_anonymous() {
        let resolver = ReleaseResolver::new(reqwest::Client::new(), "owner", "repo")
            .with_token(Some(String::new()));
        assert!(resolver.token.is_none());
    }
}
