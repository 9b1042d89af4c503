use std::path::Path;

/// Platform executable suffix (`".exe"` on Windows, empty elsewhere).
pub const EXE_SUFFIX: &str = std::env::consts::EXE_SUFFIX;

/// File name of the installed application binary.
pub const MAIN_EXECUTABLE: &str = if cfg!(windows) {
    "relaunch.exe"
} else {
    "relaunch"
};

/// File name of the installed updater binary.
pub const UPDATER_EXECUTABLE: &str = if cfg!(windows) {
    "relaunch-updater.exe"
} else {
    "relaunch-updater"
};

/// Name prefix of every staging directory created for an update.
pub const STAGING_PREFIX: &str = "relaunch-update-";

#[must_use]
pub fn is_staging_dir_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.len() > STAGING_PREFIX.len()
}

/// Whether the file at `path` carries any execute bit.
///
/// Always `true` for existing files on platforms without permission bits.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
    }

    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Mark the file at `path` as `rwxr-xr-x`. A no-op on non-Unix platforms.
///
/// # Errors
/// Returns an error if the permissions cannot be changed.
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_names_carry_platform_suffix() {
        assert!(MAIN_EXECUTABLE.ends_with(EXE_SUFFIX));
        assert!(UPDATER_EXECUTABLE.ends_with(EXE_SUFFIX));
        assert_ne!(MAIN_EXECUTABLE, UPDATER_EXECUTABLE);
    }

    #[test]
    fn staging_dir_name_requires_prefix_and_suffix() {
        assert!(is_staging_dir_name("relaunch-update-a1B2c3"));
        assert!(!is_staging_dir_name("relaunch-update-"));
        assert!(!is_staging_dir_name("tmp"));
        assert!(!is_staging_dir_name("content"));
    }

    #[cfg(unix)]
    #[test]
    fn set_executable_adds_execute_bits() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let file = temp.path().join("tool");
        std::fs::write(&file, b"#!/bin/sh\n").expect("file should be written");
        assert!(!is_executable(&file));

        set_executable(&file).expect("permissions should be updated");
        assert!(is_executable(&file));
    }

    #[test]
    fn missing_file_is_not_executable() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        assert!(!is_executable(&temp.path().join("missing")));
    }
}
