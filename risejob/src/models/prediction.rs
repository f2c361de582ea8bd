use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Renderer's estimate of how long a frame render will take.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction(Duration);

impl Prediction {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// A zero estimate means the renderer could not produce one.
    pub fn is_available(&self) -> bool {
        !self.0.is_zero()
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_available() {
            return f.write_str("No estimate available for this scene.");
        }
        let ms = self.0.as_millis();
        write!(
            f,
            "Predicted time to render the scene: {} minutes, {} seconds, {} ms.",
            ms / 60_000,
            (ms / 1000) % 60,
            ms % 1000
        )
    }
}
