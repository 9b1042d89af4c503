//! Standalone updater. Spawned by the application with the staging and
//! installation directories, it waits for the application to exit, copies
//! the staged files into place, and starts the updated application.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use relaunch_core::UpdaterHandoff;
use relaunch_core::apply::{self, ApplyError, ApplyOptions};
use relaunch_platform::AppPaths;
use relaunch_platform::logging::{DEFAULT_MAX_LOG_SIZE, init_logging};

#[derive(Debug, Parser)]
#[command(name = "relaunch-updater", version, about)]
struct Args {
    /// Directory holding the staged files of the new version
    staging: PathBuf,

    /// Installation directory to update in place
    target: PathBuf,

    /// Milliseconds to wait for the application to exit before copying
    #[arg(
        long,
        env = "RELAUNCH_UPDATER_GRACE_MS",
        default_value_t = 2000,
        hide = true
    )]
    grace_ms: u64,

    /// Apply the update but do not start the application afterwards
    #[arg(long, hide = true)]
    no_relaunch: bool,

    /// Override the updater log file location
    #[arg(long, env = "RELAUNCH_UPDATER_LOG", hide = true)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .or_else(|| AppPaths::new().ok().map(|paths| paths.updater_log_file()));
    if let Some(log_file) = log_file {
        init_logging(&log_file, false, DEFAULT_MAX_LOG_SIZE);
    }

    info!(
        "relaunch-updater {} applying {} to {}",
        env!("CARGO_PKG_VERSION"),
        args.staging.display(),
        args.target.display()
    );

    let handoff = UpdaterHandoff::new(&args.staging, &args.target);
    if let Err(err) = handoff.validate() {
        return fail(&err);
    }
    let handoff = UpdaterHandoff::new(canonical(&args.staging), canonical(&args.target));

    let options = ApplyOptions {
        grace_period: Duration::from_millis(args.grace_ms),
        ..ApplyOptions::default()
    };
    let main = match apply::apply_update(&handoff, &options) {
        Ok(main) => main,
        Err(err) => return fail(&err),
    };

    if args.no_relaunch {
        info!("Update applied, not relaunching");
        return ExitCode::SUCCESS;
    }

    let err = apply::relaunch(&main);
    fail(&err)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|err| {
        warn!("Could not canonicalize {}: {err}", path.display());
        path.to_path_buf()
    })
}

fn fail(err: &ApplyError) -> ExitCode {
    error!("Update failed: {err}");
    log::logger().flush();
    eprintln!("relaunch-updater: {err}");
    ExitCode::FAILURE
}
