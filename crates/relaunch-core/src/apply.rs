//! The updater's half of the protocol.
//!
//! Runs in a separate process after the application has exited: copy the
//! staged tree over the installation directory, check the main executable
//! landed, remove the staging leftovers, then become the new application.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::{debug, info, warn};
use relaunch_platform::{MAIN_EXECUTABLE, is_executable, is_staging_dir_name, set_executable};
use thiserror::Error;

use crate::handoff::UpdaterHandoff;

/// Pause before touching the installation so the exiting application can
/// drop its executable.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How often, and how many times, the main executable is checked for write
/// access once the grace period is over.
pub const DEFAULT_READY_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_READY_ATTEMPTS: u32 = 20;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("staging directory does not exist or is not a directory: {}", .0.display())]
    InvalidStaging(PathBuf),
    #[error("target directory does not exist or is not a directory: {}", .0.display())]
    InvalidTarget(PathBuf),
    #[error(
        "staging directory {} and target directory {} overlap",
        staging.display(),
        target.display()
    )]
    OverlappingDirectories { staging: PathBuf, target: PathBuf },
    #[error("main executable not found after copy: {}", .0.display())]
    MissingExecutable(PathBuf),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ApplyError {
    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Io {
            context,
            source: std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub main_executable: String,
    pub grace_period: Duration,
    pub ready_attempts: u32,
    pub ready_interval: Duration,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            main_executable: MAIN_EXECUTABLE.to_string(),
            grace_period: DEFAULT_GRACE_PERIOD,
            ready_attempts: DEFAULT_READY_ATTEMPTS,
            ready_interval: DEFAULT_READY_INTERVAL,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    pub files: usize,
    pub directories: usize,
}

/// Validate, wait, copy, verify, and clean up. Returns the path of the main
/// executable to relaunch.
///
/// Nothing is written when validation fails. A failure after copying has
/// started leaves the installation partially updated.
///
/// # Errors
/// Returns an error when either directory is invalid, a copy fails, or the
/// main executable is missing afterwards.
pub fn apply_update(
    handoff: &UpdaterHandoff,
    options: &ApplyOptions,
) -> Result<PathBuf, ApplyError> {
    handoff.validate()?;

    let main_path = handoff.target.join(&options.main_executable);
    wait_for_release(&main_path, options);

    let report = copy_tree(&handoff.staging, &handoff.target)?;
    info!(
        "Copied {} file(s) and {} directorie(s) into {}",
        report.files,
        report.directories,
        handoff.target.display()
    );

    let main = verify_main_executable(&handoff.target, &options.main_executable)?;
    cleanup_staging(&handoff.staging);
    Ok(main)
}

/// Sleep for the grace period, then poll until `main` can be opened for
/// writing, at most `ready_attempts` times.
///
/// Returns `false` when the file still looked busy after the bounded poll;
/// copying proceeds regardless.
pub fn wait_for_release(main: &Path, options: &ApplyOptions) -> bool {
    let grace = options.grace_period;
    if !grace.is_zero() {
        debug!("Waiting {}ms for the application to exit", grace.as_millis());
        std::thread::sleep(grace);
    }

    for attempt in 1..=options.ready_attempts {
        match std::fs::OpenOptions::new().write(true).open(main) {
            Ok(_) => return true,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return true,
            Err(error) => {
                debug!("{} still busy (attempt {attempt}): {error}", main.display());
                std::thread::sleep(options.ready_interval);
            }
        }
    }

    warn!(
        "{} still busy after waiting, copying anyway",
        main.display()
    );
    false
}

/// Recursively copy `staging` over `target`, overwriting existing files.
///
/// Each file is written next to its destination and renamed into place.
/// Execute permission is re-applied to copies of executable sources.
///
/// # Errors
/// Returns an error on the first directory or file that cannot be copied.
pub fn copy_tree(staging: &Path, target: &Path) -> Result<CopyReport, ApplyError> {
    let mut report = CopyReport::default();
    copy_dir_recursive(staging, target, &mut report)?;
    Ok(report)
}

fn copy_dir_recursive(src: &Path, dest: &Path, report: &mut CopyReport) -> Result<(), ApplyError> {
    std::fs::create_dir_all(dest)
        .map_err(|error| ApplyError::io_with_path("failed to create directory", dest, &error))?;

    for entry in std::fs::read_dir(src)
        .map_err(|error| ApplyError::io_with_path("failed to read directory", src, &error))?
    {
        let entry = entry
            .map_err(|error| ApplyError::io_with_path("failed to read directory entry", src, &error))?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|error| {
            ApplyError::io_with_path("failed to read file type", &src_path, &error)
        })?;

        if file_type.is_dir() {
            report.directories += 1;
            copy_dir_recursive(&src_path, &dest_path, report)?;
        } else {
            replace_file(&src_path, &dest_path)?;
            report.files += 1;
        }
    }
    Ok(())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(OsStr::to_string_lossy)
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

fn replace_file(src: &Path, dest: &Path) -> Result<(), ApplyError> {
    let staged = sibling_with_suffix(dest, "relaunch-new");

    std::fs::copy(src, &staged).map_err(|error| {
        ApplyError::io_with_path("failed to copy staged file", src, &error)
    })?;

    if let Ok(modified) = std::fs::metadata(src).and_then(|meta| meta.modified())
        && let Ok(file) = std::fs::File::options().write(true).open(&staged)
    {
        let _ = file.set_modified(modified);
    }

    if is_executable(src)
        && let Err(error) = set_executable(&staged)
    {
        let _ = std::fs::remove_file(&staged);
        return Err(ApplyError::io_with_path(
            "failed to restore execute permission",
            dest,
            &error,
        ));
    }

    swap_into_place(&staged, dest)
}

fn swap_into_place(staged: &Path, dest: &Path) -> Result<(), ApplyError> {
    let Err(error) = std::fs::rename(staged, dest) else {
        return Ok(());
    };

    if !dest.exists() {
        let _ = std::fs::remove_file(staged);
        return Err(ApplyError::io_with_path(
            "failed to move file into place",
            dest,
            &error,
        ));
    }

    // Windows refuses to overwrite a running executable but lets it be renamed.
    debug!(
        "Rename over {} failed ({error}), moving the old file aside",
        dest.display()
    );
    let aside = sibling_with_suffix(dest, "relaunch-old");
    discard_aside(&aside);
    if let Err(error) = std::fs::rename(dest, &aside) {
        let _ = std::fs::remove_file(staged);
        return Err(ApplyError::io_with_path(
            "failed to move existing file aside",
            dest,
            &error,
        ));
    }
    std::fs::rename(staged, dest)
        .map_err(|error| ApplyError::io_with_path("failed to move file into place", dest, &error))?;
    discard_aside(&aside);
    Ok(())
}

/// A staged file may replace a directory, so the displaced entry can be
/// either.
fn discard_aside(aside: &Path) {
    let result = match std::fs::symlink_metadata(aside) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(aside),
        Ok(_) => std::fs::remove_file(aside),
        Err(_) => return,
    };
    if let Err(error) = result {
        warn!("Failed to remove displaced {}: {error}", aside.display());
    }
}

/// Confirm the main executable exists in `target` and is executable.
///
/// # Errors
/// Returns [`ApplyError::MissingExecutable`] when it is absent, or an I/O
/// error if its permissions cannot be set.
pub fn verify_main_executable(target: &Path, main_executable: &str) -> Result<PathBuf, ApplyError> {
    let main = target.join(main_executable);
    if !main.is_file() {
        return Err(ApplyError::MissingExecutable(main));
    }
    set_executable(&main).map_err(|error| {
        ApplyError::io_with_path("failed to mark main executable", &main, &error)
    })?;
    Ok(main)
}

/// Remove the staging directory and, when its parent is itself a staging
/// directory, the downloaded archives beside it. Failures are only logged.
pub fn cleanup_staging(staging: &Path) {
    let owned_parent = staging.parent().filter(|parent| {
        parent
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(is_staging_dir_name)
    });

    if let Some(parent) = owned_parent {
        remove_archives(parent);
    }

    match std::fs::remove_dir_all(staging) {
        Ok(()) => debug!("Removed staging directory {}", staging.display()),
        Err(error) => warn!(
            "Failed to remove staging directory {}: {error}",
            staging.display()
        ),
    }

    if let Some(parent) = owned_parent
        && let Err(error) = std::fs::remove_dir(parent)
    {
        warn!("Left staging parent {} in place: {error}", parent.display());
    }
}

fn remove_archives(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip || !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed downloaded archive {}", path.display()),
            Err(error) => warn!("Failed to remove archive {}: {error}", path.display()),
        }
    }
}

/// Replace the current process with `main`, passing no arguments.
///
/// Only returns if the replacement could not happen. On platforms without
/// process-image replacement the application is spawned and this process
/// exits.
#[must_use]
pub fn relaunch(main: &Path) -> ApplyError {
    let mut command = Command::new(main);
    if let Some(dir) = main.parent() {
        command.current_dir(dir);
    }
    info!("Relaunching {}", main.display());
    log::logger().flush();

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let error = command.exec();
        ApplyError::io_with_path("failed to replace updater with application", main, &error)
    }

    #[cfg(not(unix))]
    {
        match command.spawn() {
            Ok(_) => std::process::exit(0),
            Err(error) => ApplyError::io_with_path("failed to start application", main, &error),
        }
    }
}
