//! Platform glue shared by the Relaunch application and its updater.

mod commands;
mod executable;
pub mod logging;
mod paths;
mod token;

pub use commands::Detach;
pub use executable::{
    EXE_SUFFIX, MAIN_EXECUTABLE, STAGING_PREFIX, UPDATER_EXECUTABLE, is_executable,
    is_staging_dir_name, set_executable,
};
pub use paths::{AppPaths, AppPathsError};
pub use token::{DEFAULT_TOKEN_ENV_VAR, github_token};
