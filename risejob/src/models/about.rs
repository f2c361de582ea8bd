use rise::EngineVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contents of the about box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct About {
    pub copyright: String,
    pub version: EngineVersion,
    pub build_stamp: String,
}

impl fmt::Display for About {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.copyright)?;
        writeln!(f, "{}", self.version)?;
        write!(f, "Built on: {}", self.build_stamp)
    }
}
