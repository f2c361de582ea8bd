#![allow(dead_code)]

use risejob_lib::{
    models::controller_setting::ControllerSetting, services::controller::JobController,
};
use rise::{AnimationOptions, Engine, EngineError, EngineVersion, Progress, RenderEnd};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};
use tempfile::TempDir;

pub const SCENE_HEADER: &str = "RISE ASCII SCENE 5";

// every test here moves the process working directory through the controller
static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the engine saw, readable after the engine moved into the controller.
#[derive(Debug, Default)]
pub struct Record {
    /// Working directory at every call, tagged with the call name
    pub cwd: Vec<(&'static str, PathBuf)>,
    pub loads: Vec<PathBuf>,
    pub outputs_shut_down: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Mutex<Record>>);

impl Probe {
    pub fn record(&self) -> MutexGuard<'_, Record> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn saw(&self, call: &'static str) {
        let cwd = env::current_dir().unwrap();
        self.record().cwd.push((call, cwd));
    }
}

/// Engine whose behaviour is set up front by the test.
/// Scene files start with `SCENE_HEADER`, a line starting with `keyframe` makes them animatable.
pub struct ScriptedEngine {
    pub units: u64,
    pub unit_time: Duration,
    pub prediction: Duration,
    pub fail_render: Option<String>,
    pub panic_render: bool,
    /// Panic while loading any scene whose file name is this
    pub fault_on: Option<&'static str>,
    pub panic_predict: bool,
    probe: Probe,
    scene: Option<bool>,
}

impl ScriptedEngine {
    pub fn new(probe: &Probe) -> Self {
        Self {
            units: 4,
            unit_time: Duration::from_millis(1),
            prediction: Duration::from_millis(90_250),
            fail_render: None,
            panic_render: false,
            fault_on: None,
            panic_predict: false,
            probe: probe.clone(),
            scene: None,
        }
    }

    /// Long enough that a test can always pause or stop it mid-run.
    pub fn slow(probe: &Probe) -> Self {
        Self {
            units: 5_000,
            unit_time: Duration::from_millis(2),
            ..Self::new(probe)
        }
    }

    fn rasterize(&self, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        if self.scene.is_none() {
            return Err(EngineError::NoScene);
        }
        if self.panic_render {
            panic!("scripted renderer fault");
        }
        if let Some(reason) = &self.fail_render {
            return Err(EngineError::Failed(reason.clone()));
        }
        for done in 0..=self.units {
            if done > 0 {
                thread::sleep(self.unit_time);
            }
            if !progress.progress(done, self.units) {
                return Ok(RenderEnd::Abandoned);
            }
        }
        Ok(RenderEnd::Finished)
    }
}

impl Engine for ScriptedEngine {
    fn clear_scene(&mut self) {
        self.scene = None;
    }

    fn load_scene(&mut self, path: &Path) -> Result<(), EngineError> {
        self.probe.saw("load_scene");
        self.probe.record().loads.push(path.to_path_buf());
        if let Some(name) = self.fault_on {
            if path.ends_with(name) {
                panic!("scripted parser fault in {name}");
            }
        }
        let content = fs::read_to_string(path).map_err(|e| EngineError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if !content.starts_with(SCENE_HEADER) {
            return Err(EngineError::InvalidScene("missing header".into()));
        }
        self.scene = Some(content.lines().any(|l| l.starts_with("keyframe")));
        Ok(())
    }

    fn predict_duration(&mut self, _samples: u32) -> Result<Duration, EngineError> {
        self.probe.saw("predict_duration");
        self.scene.ok_or(EngineError::NoScene)?;
        if self.panic_predict {
            panic!("scripted estimator fault");
        }
        Ok(self.prediction)
    }

    fn render_frame(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        self.probe.saw("render_frame");
        self.rasterize(progress)
    }

    fn render_animation(&mut self, progress: &dyn Progress) -> Result<RenderEnd, EngineError> {
        self.probe.saw("render_animation");
        self.rasterize(progress)
    }

    fn has_keyframed_objects(&self) -> bool {
        self.scene.unwrap_or(false)
    }

    fn animation_options(&self) -> AnimationOptions {
        AnimationOptions {
            num_frames: 12,
            ..Default::default()
        }
    }

    fn version(&self) -> EngineVersion {
        EngineVersion::new(1, 2, 3, 456, false)
    }

    fn copyright(&self) -> String {
        "(c) scripted".to_owned()
    }

    fn build_stamp(&self) -> String {
        "Jan 1 2024 at 12:00:00".to_owned()
    }

    fn shutdown_outputs(&mut self) {
        self.probe.record().outputs_shut_down = true;
    }
}

pub fn controller(engine: ScriptedEngine) -> JobController<ScriptedEngine> {
    JobController::new(engine, ControllerSetting::default())
}

/// Scene directory with an animatable `anim.scn`, a still `still.scn`, an unparsable `broken.scn`
/// and a well formed `fault.scn` for engines told to fault on it.
pub fn scenes() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("anim.scn"),
        format!("{SCENE_HEADER}\nkeyframe\n{{\n}}\n"),
    )
    .unwrap();
    fs::write(
        dir.path().join("still.scn"),
        format!("{SCENE_HEADER}\nstandard_object\n{{\n}}\n"),
    )
    .unwrap();
    fs::write(dir.path().join("broken.scn"), "not a scene\n").unwrap();
    fs::write(dir.path().join("fault.scn"), format!("{SCENE_HEADER}\n")).unwrap();
    dir
}

pub fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap()
}
