use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version format: {input:?}")]
    InvalidFormat { input: String },
}

/// A dotted numeric version such as `v1.2.3` or `2.0`.
///
/// Release fields compare numerically and missing trailing fields count as
/// zero, so `1.2` equals `1.2.0`. An optional `-pre` suffix orders below the
/// plain release, following semver precedence. `+build` metadata is accepted
/// and ignored.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Prerelease,
}

impl Version {
    /// Parse `text`, dropping one leading non-digit prefix character.
    ///
    /// # Errors
    /// Returns [`VersionError::InvalidFormat`] when any release field is not
    /// an unsigned integer or the suffix is not a valid semver suffix.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat {
            input: text.to_string(),
        };

        let trimmed = text.trim();
        let body = match trimmed.chars().next() {
            Some(first) if first.is_ascii_digit() => trimmed,
            Some(first) => &trimmed[first.len_utf8()..],
            None => return Err(invalid()),
        };

        let (core, suffix) = split_core_and_suffix(body);
        let release = core
            .split('.')
            .map(parse_field)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?;
        let pre = parse_suffix(suffix).ok_or_else(invalid)?;

        Ok(Self { release, pre })
    }

    fn field(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }
}

fn parse_field(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn split_core_and_suffix(version: &str) -> (&str, &str) {
    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    (&version[..suffix_idx], &version[suffix_idx..])
}

fn parse_suffix(suffix: &str) -> Option<Prerelease> {
    let (pre, build) = match suffix.split_once('+') {
        Some((pre, build)) => (pre, Some(build)),
        None => (suffix, None),
    };

    if let Some(build) = build
        && (build.is_empty() || BuildMetadata::new(build).is_err())
    {
        return None;
    }

    match pre.strip_prefix('-') {
        Some(pre) if !pre.is_empty() => Prerelease::new(pre).ok(),
        Some(_) => None,
        None if pre.is_empty() => Some(Prerelease::EMPTY),
        None => None,
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let fields = self.release.len().max(other.release.len());
        let release = (0..fields)
            .map(|index| self.field(index).cmp(&other.field(index)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal);
        if release.is_ne() {
            return release;
        }

        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, field) in self.release.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{field}")?;
        }
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        Ok(())
    }
}

/// Whether `remote` is strictly newer than `local`.
///
/// # Errors
/// Returns an error if either string is not a valid version.
pub fn is_newer_version(remote: &str, local: &str) -> Result<bool, VersionError> {
    Ok(Version::parse(remote)? > Version::parse(local)?)
}
