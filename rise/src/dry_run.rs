/*
    DryRunEngine stands in for the native rasterizer so the job controller and the console shell
    can be driven end to end without the renderer library.
    It does not understand scenes. Loading only checks the file marker and whether a keyframe chunk
    shows up, and "rendering" is stepping through scanlines with a fixed cost per scanline.
*/
use crate::engine::{Engine, EngineError, Progress, RenderEnd};
use crate::models::{animation_options::AnimationOptions, version::EngineVersion};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tracing::{debug, info};

const SCENE_MARKER: &str = "RISE ASCII SCENE";
const KEYFRAME_CHUNK: &str = "keyframe";
const COPYRIGHT: &str = "R.I.S.E. (Realistic Image Synthesis Engine)";

/// Cost model for the dry run renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DryRun {
    /// Rendering units per frame
    pub scanlines: u32,
    /// Time spent on every unit, in milliseconds
    pub unit_time_ms: u64,
}

impl Default for DryRun {
    fn default() -> Self {
        Self {
            scanlines: 48,
            unit_time_ms: 25,
        }
    }
}

impl DryRun {
    pub fn unit_time(&self) -> Duration {
        Duration::from_millis(self.unit_time_ms)
    }
}

#[derive(Debug)]
struct LoadedScene {
    path: PathBuf,
    keyframed: bool,
}

#[derive(Debug, Default)]
pub struct DryRunEngine {
    setting: DryRun,
    scene: Option<LoadedScene>,
    animation: AnimationOptions,
}

impl DryRunEngine {
    pub fn new(setting: DryRun) -> Self {
        Self {
            setting,
            scene: None,
            animation: AnimationOptions::default(),
        }
    }

    pub fn scene(&self) -> Option<&Path> {
        self.scene.as_ref().map(|s| s.path.as_path())
    }

    // one pass over the scanlines of a frame, `offset` units already done by earlier frames.
    fn rasterize(&self, offset: u64, total: u64, progress: &dyn Progress) -> bool {
        let unit = self.setting.unit_time();
        for line in 1..=u64::from(self.setting.scanlines) {
            thread::sleep(unit);
            if !progress.progress(offset + line, total) {
                return false;
            }
        }
        true
    }
}

impl Engine for DryRunEngine {
    fn clear_scene(&mut self) {
        self.scene = None;
        self.animation = AnimationOptions::default();
    }

    fn load_scene(&mut self, path: &Path) -> Result<(), EngineError> {
        self.clear_scene();

        let content = fs::read_to_string(path).map_err(|e| EngineError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        match lines.next() {
            Some(first) if first.starts_with(SCENE_MARKER) => {}
            _ => {
                return Err(EngineError::InvalidScene(format!(
                    "{} does not start with the `{}` marker",
                    path.display(),
                    SCENE_MARKER
                )))
            }
        }

        let keyframed = lines.any(|l| l.starts_with(KEYFRAME_CHUNK));
        info!("Dry run loaded scene {:?} (keyframed: {})", path, keyframed);
        self.scene = Some(LoadedScene {
            path: path.to_path_buf(),
            keyframed,
        });
        Ok(())
    }

    fn predict_duration(&mut self, samples: u32) -> Result<Duration, EngineError> {
        if self.scene.is_none() {
            return Err(EngineError::NoScene);
        }
        // the estimate is exact for a dry run, sampling only costs time.
        debug!("Dry run prediction with {} samples", samples);
        self.setting
            .unit_time()
            .checked_mul(self.setting.scanlines)
            .ok_or_else(|| {
                EngineError::Failed(format!(
                    "{} scanlines at {} ms each do not fit in a duration",
                    self.setting.scanlines, self.setting.unit_time_ms
                ))
            })
    }

    fn render_frame(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        if self.scene.is_none() {
            return Err(EngineError::NoScene);
        }
        let total = u64::from(self.setting.scanlines);
        if !progress.progress(0, total) || !self.rasterize(0, total, progress) {
            return Ok(RenderEnd::Abandoned);
        }
        Ok(RenderEnd::Finished)
    }

    fn render_animation(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        if self.scene.is_none() {
            return Err(EngineError::NoScene);
        }
        let per_frame = u64::from(self.setting.scanlines);
        let total = per_frame * u64::from(self.animation.num_frames);
        if !progress.progress(0, total) {
            return Ok(RenderEnd::Abandoned);
        }
        for frame in self.animation.frames() {
            debug!(
                "Dry run frame {} at scene time {:.3}",
                frame,
                self.animation.time_of(frame)
            );
            if !self.rasterize(per_frame * u64::from(frame), total, progress) {
                return Ok(RenderEnd::Abandoned);
            }
        }
        Ok(RenderEnd::Finished)
    }

    fn has_keyframed_objects(&self) -> bool {
        self.scene.as_ref().is_some_and(|s| s.keyframed)
    }

    fn animation_options(&self) -> AnimationOptions {
        self.animation.clone()
    }

    fn version(&self) -> EngineVersion {
        let version = semver::Version::parse(env!("CARGO_PKG_VERSION"))
            .unwrap_or_else(|_| semver::Version::new(0, 0, 0));
        EngineVersion {
            version,
            build: 0,
            debug: cfg!(debug_assertions),
        }
    }

    fn copyright(&self) -> String {
        format!("{} - dry run renderer", COPYRIGHT)
    }

    fn build_stamp(&self) -> String {
        format!("dry run build of rise {}", env!("CARGO_PKG_VERSION"))
    }

    fn shutdown_outputs(&mut self) {
        info!("Dry run outputs shut down");
    }
}
