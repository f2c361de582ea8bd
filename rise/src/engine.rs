/*
    Developer blog:
    - Every call on this trait blocks until the renderer returns. Nothing here spawns threads,
      that is the job controller's business.
    - Long calls (render_frame / render_animation) never get suspended or killed from outside.
      Instead the renderer calls back into `Progress` once per rendering unit (scanline, tile or
      frame, whatever the rasterizer hands out) and bails out when the callback says so.
    - Relative asset paths inside a scene resolve against the process working directory, so the
      caller is expected to switch into the scene directory around load/predict/render calls.
*/
use crate::models::{animation_options::AnimationOptions, mode::Mode, version::EngineVersion};
use std::{path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No scene is loaded")]
    NoScene,
    #[error("Unable to read scene file {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("Not a R.I.S.E. scene: {0}")]
    InvalidScene(String),
    #[error("Renderer failed: {0}")]
    Failed(String),
}

/// How a render call ended when the renderer itself did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderEnd {
    /// Every unit of work was rasterized.
    Finished,
    /// The progress callback asked the renderer to stop early.
    Abandoned,
}

/// Cooperative checkpoint handed to the renderer for the duration of a render call.
pub trait Progress {
    /// Called once before work starts and after every rendering unit with the units done so far.
    /// Returning `false` asks the renderer to abandon the call; it must return
    /// `Ok(RenderEnd::Abandoned)` before starting another unit.
    /// The call may block for as long as the caller wants the render parked.
    fn progress(&self, done: u64, total: u64) -> bool;
}

/// Closures make handy checkpoints for tools and tests.
impl<F> Progress for F
where
    F: Fn(u64, u64) -> bool,
{
    fn progress(&self, done: u64, total: u64) -> bool {
        self(done, total)
    }
}

/// Everything the job controller needs from a renderer.
pub trait Engine: Send + 'static {
    /// Drop every object, painter, light and output belonging to the current scene.
    fn clear_scene(&mut self);

    /// Load an ascii scene file. On error the engine holds no scene.
    fn load_scene(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Estimate how long `render_frame` would take by tracing `samples` sample rays.
    /// `Duration::ZERO` means the renderer has no estimate to give, which is not an error.
    fn predict_duration(&mut self, samples: u32) -> Result<Duration, EngineError>;

    fn render_frame(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError>;

    /// Render the whole animation using the scene's animation options.
    fn render_animation(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError>;

    fn has_keyframed_objects(&self) -> bool;

    fn animation_options(&self) -> AnimationOptions;

    fn version(&self) -> EngineVersion;

    fn copyright(&self) -> String;

    /// Date and time the renderer was built.
    fn build_stamp(&self) -> String;

    /// Close output windows and flush file writers. Called once before the process exits.
    fn shutdown_outputs(&mut self);

    /// Dispatch to the render call matching `mode`.
    fn render(&mut self, mode: Mode, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        match mode {
            Mode::Frame => self.render_frame(progress),
            Mode::Animation => self.render_animation(progress),
        }
    }
}
