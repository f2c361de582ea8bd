use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version block the renderer reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    /// major.minor.revision of the renderer library
    pub version: Version,
    /// Build number, independent of the semantic version
    pub build: u32,
    /// Whether the renderer was compiled with debug checks on
    pub debug: bool,
}

impl EngineVersion {
    pub fn new(major: u64, minor: u64, revision: u64, build: u32, debug: bool) -> Self {
        Self {
            version: Version::new(major, minor, revision),
            build,
            debug,
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "version {} build {}", self.version, self.build)?;
        if self.debug {
            write!(f, " (debug)")?;
        }
        Ok(())
    }
}
