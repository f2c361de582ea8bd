use serde::{Deserialize, Serialize};
use std::fmt;

// context for serde: https://serde.rs/enum-representations.html
/// Kind of render a run performs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    // JSON: "Frame"
    /// Rasterize the scene once at its current time.
    Frame,
    // JSON: "Animation"
    /// Rasterize every frame described by the scene's animation options.
    Animation,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Frame => write!(f, "frame"),
            Mode::Animation => write!(f, "animation"),
        }
    }
}
