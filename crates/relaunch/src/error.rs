use relaunch_core::VersionError;
use relaunch_platform::AppPathsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to resolve application directories: {0}")]
    Paths(#[from] AppPathsError),

    #[error("built-in version is not valid: {0}")]
    Version(#[from] VersionError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}
