/*
    Developer blog:
    - The controller owns the one Job of the session and is the only thing that mutates it.
      Worker threads never touch the job. They send WorkerEvents and the controller applies them
      when the owner calls poll(), next_update() or one of the wait helpers.
    - Load and predict run on the caller's thread and block. Renders go to a Worker.
    - While a run is in flight the worker holds the engine lock for the whole render call.
      Nothing here may lock the engine while self.worker is Some, so engine facts the shell might
      want mid-render (about box, animation options) are cached up front.
    - Stop is terminal. The job is thrown away and a fresh idle one takes its place.
*/
use crate::models::{
    about::About,
    actions::Actions,
    controller_setting::ControllerSetting,
    error::{JobError, Operation, Severity},
    job::{Job, JobEvent, JobState},
    prediction::Prediction,
    render_run::{RenderRun, RunOutcome},
};
use crate::services::{
    worker::{panic_message, Worker, WorkerEvent},
    working_dir::WorkingDir,
};
use rise::{AnimationOptions, Engine, EngineError, Mode};
use std::{
    fs,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// how often the blocking wait helpers look at the worker channel
const WAIT_STEP: Duration = Duration::from_millis(5);

/// What a successful load left in the engine.
struct LoadedScene {
    keyframed: bool,
    animation: AnimationOptions,
}

pub struct JobController<E: Engine> {
    engine: Arc<Mutex<E>>,
    job: Job,
    worker: Option<Worker>,
    setting: ControllerSetting,
    about: About,
    animation: AnimationOptions,
    // the controller keeps a sender so the channel stays open between runs
    to_self: UnboundedSender<WorkerEvent>,
    from_workers: UnboundedReceiver<WorkerEvent>,
    subscribers: Vec<UnboundedSender<JobEvent>>,
    shut_down: bool,
}

impl<E: Engine> JobController<E> {
    pub fn new(engine: E, setting: ControllerSetting) -> Self {
        let about = About {
            copyright: engine.copyright(),
            version: engine.version(),
            build_stamp: engine.build_stamp(),
        };
        let (to_self, from_workers) = unbounded_channel();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            job: Job::new(),
            worker: None,
            setting,
            about,
            animation: AnimationOptions::default(),
            to_self,
            from_workers,
            subscribers: Vec::new(),
            shut_down: false,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> JobState {
        self.job.state()
    }

    pub fn setting(&self) -> &ControllerSetting {
        &self.setting
    }

    pub fn actions(&self) -> Actions {
        Actions::for_job(&self.job, self.setting.allow_stop_while_paused)
    }

    pub fn about(&self) -> &About {
        &self.about
    }

    /// Animation options of the loaded scene, defaults when nothing is loaded.
    pub fn animation_options(&self) -> &AnimationOptions {
        &self.animation
    }

    pub fn active_run(&self) -> Option<&RenderRun> {
        self.worker.as_ref().map(Worker::run)
    }

    /// Receive every state change, progress report, run result and asynchronous error from now on.
    pub fn subscribe(&mut self) -> UnboundedReceiver<JobEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Load a scene file, replacing the current scene.
    /// On failure the job keeps whatever scene it had before the call.
    pub fn load_scene(&mut self, path: impl AsRef<Path>) -> Result<(), JobError> {
        self.require(Operation::LoadScene, &[JobState::Idle, JobState::SceneLoaded])?;

        let path = path.as_ref();
        let failed = |reason: String| JobError::SceneLoadFailed {
            path: path.display().to_string(),
            reason,
        };

        // absolute, since the engine sees it from inside the scene directory
        let scene = fs::canonicalize(path).map_err(|e| failed(e.to_string()))?;

        match self.load_into_engine(&scene) {
            Ok(loaded) => {
                info!(
                    "Job {} loaded scene {:?} (keyframed: {})",
                    self.job.id, &scene, loaded.keyframed
                );
                self.animation = loaded.animation;
                self.job.scene_loaded(scene, loaded.keyframed);
                self.emit_state();
                Ok(())
            }
            Err(reason) => {
                warn!("Fail to load scene {:?}: {}", &scene, &reason);
                self.restore_prior_scene();
                Err(failed(reason))
            }
        }
    }

    /// Ask the renderer how long a frame render would take. A zero estimate is a valid answer.
    pub fn predict(&mut self) -> Result<Prediction, JobError> {
        self.require(Operation::Predict, &[JobState::SceneLoaded])?;

        let dir = self.job.scene().map(WorkingDir::scene_dir);
        let samples = self.setting.prediction_samples;
        let duration = {
            let mut engine = self.lock_engine();
            let _cwd = enter_dir(dir.as_deref())?;
            match panic::catch_unwind(AssertUnwindSafe(|| engine.predict_duration(samples))) {
                Ok(result) => result.map_err(|e| JobError::EngineFailure(e.to_string()))?,
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!("Prediction for job {} faulted: {}", self.job.id, &reason);
                    return Err(JobError::EngineFailure(reason));
                }
            }
        };

        let prediction = Prediction::new(duration);
        debug!("Prediction for job {}: {:?}", self.job.id, duration);
        Ok(prediction)
    }

    /// Hand a new render run to a worker thread. Returns the run id.
    pub fn start_render(&mut self, mode: Mode) -> Result<Uuid, JobError> {
        if self.worker.is_some() {
            return Err(JobError::RunAlreadyActive);
        }
        let operation = match mode {
            Mode::Frame => Operation::Render,
            Mode::Animation => Operation::RenderAnimation,
        };
        self.require(operation, &[JobState::SceneLoaded])?;
        if mode == Mode::Animation && !self.job.has_keyframed_objects() {
            return Err(JobError::NothingToAnimate);
        }

        let run = RenderRun::new(mode);
        let run_id = run.id;
        let scene_dir = self.job.scene().map(WorkingDir::scene_dir);
        let worker = Worker::spawn(
            self.engine.clone(),
            run,
            scene_dir,
            self.setting.checkpoint_interval(),
            self.to_self.clone(),
        )
        .map_err(|e| JobError::WorkerSpawn(e.to_string()))?;

        info!("Job {} started {} run {}", self.job.id, mode, run_id);
        self.worker = Some(worker);
        self.transition(JobState::Running);
        Ok(run_id)
    }

    /// Ask the worker to park at its next checkpoint. The job reads `Paused` once the worker confirms.
    pub fn request_pause(&mut self) -> Result<(), JobError> {
        self.require(Operation::Pause, &[JobState::Running])?;
        let worker = self.running_worker(Operation::Pause)?;
        worker.signals().request_pause();
        self.transition(JobState::PendingPause);
        Ok(())
    }

    /// Let a parked worker carry on. A pause the worker has not confirmed yet cannot be resumed.
    pub fn request_resume(&mut self) -> Result<(), JobError> {
        self.require(Operation::Resume, &[JobState::Paused])?;
        let worker = self.running_worker(Operation::Resume)?;
        worker.signals().request_resume();
        self.transition(JobState::Running);
        Ok(())
    }

    /// Cancel the active run, wait for the worker to let go, then discard the job.
    /// A paused run can only be stopped when `allow_stop_while_paused` is set.
    pub fn request_stop(&mut self) -> Result<RunOutcome, JobError> {
        let state = self.job.state();
        let allowed = match state {
            JobState::Running => true,
            JobState::PendingPause | JobState::Paused => self.setting.allow_stop_while_paused,
            JobState::Idle | JobState::SceneLoaded => false,
        };
        if !allowed {
            return Err(JobError::not_allowed(Operation::Stop, state));
        }
        let Some(mut worker) = self.worker.take() else {
            return Err(JobError::not_allowed(Operation::Stop, state));
        };

        // a parked worker has to wake up to notice the cancel
        worker.signals().request_cancel();
        worker.signals().request_resume();
        worker.join();

        let run_id = worker.id();
        let outcome = self.drain_run(run_id).unwrap_or(RunOutcome::Cancelled);
        info!("Run {} stopped: {:?}", run_id, outcome);
        self.emit(JobEvent::RunFinished {
            run_id,
            outcome: outcome.clone(),
        });
        self.discard_job();
        Ok(outcome)
    }

    /// Apply whatever the worker reported so far without blocking.
    /// Returns the outcome when the active run ended.
    pub fn poll(&mut self) -> Option<RunOutcome> {
        let mut finished = None;
        while let Ok(event) = self.from_workers.try_recv() {
            if let Some(outcome) = self.apply(event) {
                finished = Some(outcome);
            }
        }
        finished
    }

    /// Wait for the next worker report and apply it. Pending forever while no run is active.
    pub async fn next_update(&mut self) -> Option<RunOutcome> {
        let event = self.from_workers.recv().await?;
        self.apply(event)
    }

    /// Block until `done` holds for the job, applying worker reports meanwhile.
    /// Returns `false` on timeout.
    pub fn wait_for(&mut self, timeout: Duration, mut done: impl FnMut(&Job) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if done(&self.job) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(WAIT_STEP);
        }
    }

    /// Block until the active run ends. `None` when there is no run or on timeout.
    pub fn wait_for_outcome(&mut self, timeout: Duration) -> Option<RunOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(outcome) = self.poll() {
                return Some(outcome);
            }
            if self.worker.is_none() || Instant::now() >= deadline {
                return None;
            }
            thread::sleep(WAIT_STEP);
        }
    }

    /// Wind down before the process exits: wake a paused worker, cancel it, wait for it,
    /// then close the renderer's outputs. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(mut worker) = self.worker.take() {
            info!("Shutting down with run {} in flight", worker.id());
            worker.signals().request_resume();
            worker.signals().request_cancel();
            worker.join();
            self.transition(self.job.settled_state());
        }
        self.lock_engine().shutdown_outputs();
    }

    fn apply(&mut self, event: WorkerEvent) -> Option<RunOutcome> {
        let current = self.worker.as_ref().map(Worker::id);
        match event {
            WorkerEvent::Progress {
                run_id,
                done,
                total,
            } if Some(run_id) == current => {
                self.emit(JobEvent::Progress {
                    run_id,
                    done,
                    total,
                });
                None
            }
            WorkerEvent::Parked { run_id } if Some(run_id) == current => {
                // a late ack from an earlier pause must not flip a running job to paused
                let parked = self
                    .worker
                    .as_ref()
                    .is_some_and(|w| w.signals().is_parked());
                if self.job.state() == JobState::PendingPause && parked {
                    self.transition(JobState::Paused);
                }
                None
            }
            WorkerEvent::Finished { run_id, outcome } if Some(run_id) == current => {
                self.finish_run(run_id, outcome.clone());
                Some(outcome)
            }
            other => {
                debug!("Ignoring worker report {:?}", other);
                None
            }
        }
    }

    fn finish_run(&mut self, run_id: Uuid, outcome: RunOutcome) {
        if let Some(mut worker) = self.worker.take() {
            worker.join();
        }

        match &outcome {
            RunOutcome::Completed => info!("Run {} completed", run_id),
            RunOutcome::Cancelled => warn!("Run {} was abandoned by the renderer", run_id),
            RunOutcome::Failed(reason) => {
                error!("Run {} failed: {}", run_id, reason);
                let err = JobError::EngineFailure(reason.clone());
                self.emit(JobEvent::Error {
                    message: err.to_string(),
                    severity: err.severity(),
                });
            }
        }

        // worker is gone, the engine is ours again
        if self.job.scene().is_some() {
            let keyframed = self.lock_engine().has_keyframed_objects();
            self.job.set_keyframed(keyframed);
        }

        self.emit(JobEvent::RunFinished { run_id, outcome });
        self.transition(self.job.settled_state());
    }

    // collect what the stopped run left in the channel, returning its outcome
    fn drain_run(&mut self, run_id: Uuid) -> Option<RunOutcome> {
        let mut outcome = None;
        while let Ok(event) = self.from_workers.try_recv() {
            match event {
                WorkerEvent::Finished { run_id: id, outcome: o } if id == run_id => outcome = Some(o),
                other => debug!("Dropping report from stopped run: {:?}", other),
            }
        }
        outcome
    }

    fn discard_job(&mut self) {
        self.lock_engine().clear_scene();
        self.animation = AnimationOptions::default();
        let old = std::mem::take(&mut self.job);
        info!("Job {} discarded, fresh job {}", old.id, self.job.id);
        self.emit(JobEvent::Stopped { job_id: old.id });
        self.emit_state();
    }

    fn load_into_engine(&self, scene: &Path) -> Result<LoadedScene, String> {
        let dir = WorkingDir::scene_dir(scene);
        let mut engine = self.lock_engine();
        let _cwd = WorkingDir::enter(&dir)
            .map_err(|e| format!("unable to enter {:?}: {e}", &dir))?;
        // a faulting renderer must not take the caller down with it
        let loaded = panic::catch_unwind(AssertUnwindSafe(|| -> Result<LoadedScene, EngineError> {
            engine.clear_scene();
            engine.load_scene(scene)?;
            Ok(LoadedScene {
                keyframed: engine.has_keyframed_objects(),
                animation: engine.animation_options(),
            })
        }));
        match loaded {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }

    // a failed load cleared the engine, so put the previous scene back
    fn restore_prior_scene(&mut self) {
        let Some(prior) = self.job.scene().map(Path::to_path_buf) else {
            return;
        };
        match self.load_into_engine(&prior) {
            Ok(loaded) => {
                debug!("Restored prior scene {:?}", &prior);
                self.animation = loaded.animation;
                self.job.set_keyframed(loaded.keyframed);
            }
            Err(reason) => {
                warn!("Unable to restore prior scene {:?}: {}", &prior, &reason);
                self.animation = AnimationOptions::default();
                self.job.scene_lost();
                self.emit(JobEvent::Error {
                    message: format!(
                        "Previous scene `{}` could not be restored: {}",
                        prior.display(),
                        reason
                    ),
                    severity: Severity::Warning,
                });
                self.emit_state();
            }
        }
    }

    fn running_worker(&self, operation: Operation) -> Result<&Worker, JobError> {
        self.worker
            .as_ref()
            .ok_or_else(|| JobError::not_allowed(operation, self.job.state()))
    }

    fn require(&self, operation: Operation, allowed: &[JobState]) -> Result<(), JobError> {
        let state = self.job.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(JobError::not_allowed(operation, state))
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&mut self, state: JobState) {
        let from = self.job.state();
        self.job.set_state(state);
        debug!("Job {}: {} -> {}", self.job.id, from, state);
        self.emit_state();
    }

    fn emit_state(&mut self) {
        let event = JobEvent::StateChanged {
            state: self.job.state(),
            actions: self.actions(),
        };
        self.emit(event);
    }

    fn emit(&mut self, event: JobEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<E: Engine> Drop for JobController<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn enter_dir(dir: Option<&Path>) -> Result<Option<WorkingDir>, JobError> {
    WorkingDir::enter_optional(dir).map_err(|e| JobError::WorkingDirectory {
        path: dir.map(|d| d.display().to_string()).unwrap_or_default(),
        reason: e.to_string(),
    })
}
