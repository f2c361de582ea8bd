use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Animation settings a scene carries for `render_animation`.
/// Defaults match what the renderer assumes when a scene has no `animation_options` chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationOptions {
    /// Scene time to start rasterizing at
    pub time_start: f64,
    /// Scene time to finish rasterizing
    pub time_end: f64,
    /// Number of frames to rasterize
    pub num_frames: u32,
    /// Rasterize interlaced fields instead of whole frames
    pub do_fields: bool,
    /// Temporally invert the fields
    pub invert_fields: bool,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            time_start: 0.0,
            time_end: 1.0,
            num_frames: 30,
            do_fields: false,
            invert_fields: false,
        }
    }
}

impl AnimationOptions {
    pub fn frames(&self) -> Range<u32> {
        0..self.num_frames
    }

    /// Scene time a given frame lands on. A single frame animation sits at `time_start`.
    pub fn time_of(&self, frame: u32) -> f64 {
        if self.num_frames <= 1 {
            return self.time_start;
        }
        let step = (self.time_end - self.time_start) / f64::from(self.num_frames - 1);
        self.time_start + step * f64::from(frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_spans_thirty_frames_over_one_second() {
        let options = AnimationOptions::default();
        assert_eq!(options.frames().len(), 30);
        assert_eq!(options.time_of(0), 0.0);
        assert!((options.time_of(29) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_frame_stays_at_start() {
        let options = AnimationOptions {
            time_start: 2.5,
            num_frames: 1,
            ..Default::default()
        };
        assert_eq!(options.time_of(0), 2.5);
    }
}
