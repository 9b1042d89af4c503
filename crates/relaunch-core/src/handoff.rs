use std::ffi::OsStr;
use std::path::PathBuf;

use crate::apply::ApplyError;

/// Everything the launcher tells the updater: where the staged files are and
/// which installation directory they replace. Travels as exactly two
/// positional process arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterHandoff {
    pub staging: PathBuf,
    pub target: PathBuf,
}

impl UpdaterHandoff {
    pub fn new(staging: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
            target: target.into(),
        }
    }

    #[must_use]
    pub fn to_args(&self) -> [&OsStr; 2] {
        [self.staging.as_os_str(), self.target.as_os_str()]
    }

    /// Check both directories before anything is touched.
    ///
    /// The two must be distinct and neither may contain the other: staging is
    /// deleted once copied, and a target inside staging would be copied into
    /// itself.
    ///
    /// # Errors
    /// Returns [`ApplyError::InvalidStaging`] or [`ApplyError::InvalidTarget`]
    /// when the path is missing or not a directory, and
    /// [`ApplyError::OverlappingDirectories`] when they overlap.
    pub fn validate(&self) -> Result<(), ApplyError> {
        if !self.staging.is_dir() {
            return Err(ApplyError::InvalidStaging(self.staging.clone()));
        }
        if !self.target.is_dir() {
            return Err(ApplyError::InvalidTarget(self.target.clone()));
        }

        let staging = std::fs::canonicalize(&self.staging)
            .map_err(|_| ApplyError::InvalidStaging(self.staging.clone()))?;
        let target = std::fs::canonicalize(&self.target)
            .map_err(|_| ApplyError::InvalidTarget(self.target.clone()))?;
        if staging.starts_with(&target) || target.starts_with(&staging) {
            return Err(ApplyError::OverlappingDirectories { staging, target });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_staging_then_target() {
        let handoff = UpdaterHandoff::new("/tmp/stage", "/opt/app");
        let [staging, target] = handoff.to_args();
        assert_eq!(staging, OsStr::new("/tmp/stage"));
        assert_eq!(target, OsStr::new("/opt/app"));
    }

    #[test]
    fn validate_rejects_missing_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let existing = temp.path().to_path_buf();
        let missing = temp.path().join("missing");

        assert!(matches!(
            UpdaterHandoff::new(&missing, &existing).validate(),
            Err(ApplyError::InvalidStaging(path)) if path == missing
        ));
        assert!(matches!(
            UpdaterHandoff::new(&existing, &missing).validate(),
            Err(ApplyError::InvalidTarget(path)) if path == missing
        ));
    }

    #[test]
    fn validate_accepts_disjoint_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let staging = temp.path().join("relaunch-update-1/content");
        let target = temp.path().join("install");
        std::fs::create_dir_all(&staging).expect("staging should be created");
        std::fs::create_dir_all(&target).expect("target should be created");

        assert!(UpdaterHandoff::new(&staging, &target).validate().is_ok());
    }

    #[test]
    fn validate_rejects_same_directory() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let install = temp.path().join("install");
        std::fs::create_dir_all(&install).expect("install should be created");
        let spelled_differently = install.join(".");

        assert!(matches!(
            UpdaterHandoff::new(&install, &spelled_differently).validate(),
            Err(ApplyError::OverlappingDirectories { .. })
        ));
    }

    #[test]
    fn validate_rejects_nested_directories() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let outer = temp.path().join("outer");
        let inner = outer.join("inner");
        std::fs::create_dir_all(&inner).expect("nested dirs should be created");

        assert!(matches!(
            UpdaterHandoff::new(&inner, &outer).validate(),
            Err(ApplyError::OverlappingDirectories { .. })
        ));
        assert!(matches!(
            UpdaterHandoff::new(&outer, &inner).validate(),
            Err(ApplyError::OverlappingDirectories { .. })
        ));
    }

    #[test]
    fn sibling_with_shared_name_prefix_is_not_nested() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let install = temp.path().join("app");
        let staging = temp.path().join("app-new");
        std::fs::create_dir_all(&install).expect("install should be created");
        std::fs::create_dir_all(&staging).expect("staging should be created");

        assert!(UpdaterHandoff::new(&staging, &install).validate().is_ok());
    }

    #[test]
    fn validate_rejects_files() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let file = temp.path().join("file");
        std::fs::write(&file, b"x").expect("file should be written");

        assert!(matches!(
            UpdaterHandoff::new(&file, temp.path()).validate(),
            Err(ApplyError::InvalidStaging(_))
        ));
    }
}
