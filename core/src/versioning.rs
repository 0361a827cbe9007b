use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;
use std::fmt;

/// A parsed "major.minor[.patch]" producer version.
///
/// Only major and minor take part in comparisons; bugfix releases of the
/// producer never change the metadata schema, so the patch segment (and
/// anything after it) is ignored.
#[derive(Debug, Clone)]
pub struct Version {
    major: u32,
    minor: u32,
    original: String,
}

impl Version {
    pub fn parse(version: &str) -> CoreResult<Self> {
        let mut parts = version.split('.');
        let major = parts.next().and_then(|s| s.parse().ok());
        let minor = parts.next().and_then(|s| s.parse().ok());
        match (major, minor) {
            (Some(major), Some(minor)) => Ok(Self {
                major,
                minor,
                original: version.to_string(),
            }),
            _ => Err(CoreError::UnsupportedVersionFormat {
                version: version.to_string(),
            }),
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Check a producer version string against the supported one.
///
/// Fails with [`CoreError::VersionMismatch`] when the results were generated
/// by an older producer, since older producers may write an incompatible
/// schema.
pub fn check_version(used: &str, supported: &str) -> CoreResult<()> {
    let supported_version = Version::parse(supported)?;
    let used_version = Version::parse(used)?;

    if used_version < supported_version {
        return Err(CoreError::VersionMismatch {
            used: used.to_string(),
            supported: supported.to_string(),
        });
    }
    Ok(())
}
