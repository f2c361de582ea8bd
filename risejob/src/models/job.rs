/*
    Developer Blog:
    - A Job is one loaded scene plus at most one render run. The controller owns the only instance
      and swaps in a brand new one after a stop, so "stopped" is never a state a Job can be in.
    - Paused is split in two: PendingPause is "we asked the worker to park", Paused is "the worker
      told us it parked". Only the worker can confirm the second one.
*/
use super::{actions::Actions, error::Severity, render_run::RunOutcome};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::Hash,
    path::{Path, PathBuf},
};
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// No scene loaded
    Idle,
    /// Scene present, nothing rendering
    SceneLoaded,
    /// A frame or animation render is in progress
    Running,
    /// Pause requested, waiting for the worker to reach a checkpoint
    PendingPause,
    /// Worker parked at a checkpoint
    Paused,
}

impl JobState {
    /// A render run exists in these states.
    pub fn is_rendering(&self) -> bool {
        matches!(
            self,
            JobState::Running | JobState::PendingPause | JobState::Paused
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::SceneLoaded => "scene loaded",
            JobState::Running => "running",
            JobState::PendingPause => "pausing",
            JobState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Notifications for the presentation side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    StateChanged { state: JobState, actions: Actions },
    Progress { run_id: Uuid, done: u64, total: u64 },
    RunFinished { run_id: Uuid, outcome: RunOutcome },
    /// The job was thrown away. A fresh idle job takes its place.
    Stopped { job_id: Uuid },
    Error { message: String, severity: Severity },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: Uuid,
    state: JobState,
    /// Canonical path of the loaded scene file
    scene: Option<PathBuf>,
    has_keyframed_objects: bool,
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl Job {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: JobState::Idle,
            scene: None,
            has_keyframed_objects: false,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn scene(&self) -> Option<&Path> {
        self.scene.as_deref()
    }

    pub fn has_keyframed_objects(&self) -> bool {
        self.has_keyframed_objects
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    pub(crate) fn scene_loaded(&mut self, scene: PathBuf, has_keyframed_objects: bool) {
        self.scene = Some(scene);
        self.has_keyframed_objects = has_keyframed_objects;
        self.state = JobState::SceneLoaded;
    }

    pub(crate) fn set_keyframed(&mut self, has_keyframed_objects: bool) {
        self.has_keyframed_objects = has_keyframed_objects;
    }

    /// Forget the scene. Used when the engine no longer holds it.
    pub(crate) fn scene_lost(&mut self) {
        self.scene = None;
        self.has_keyframed_objects = false;
        self.state = JobState::Idle;
    }

    /// State to return to once a run ends, whatever the reason.
    pub(crate) fn settled_state(&self) -> JobState {
        if self.scene.is_some() {
            JobState::SceneLoaded
        } else {
            JobState::Idle
        }
    }
}

impl AsRef<Uuid> for Job {
    fn as_ref(&self) -> &Uuid {
        &self.id
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for Job {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
