use super::job::JobState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Operator facing operations, named in errors and logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    LoadScene,
    Predict,
    Render,
    RenderAnimation,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::LoadScene => "load scene",
            Operation::Predict => "predict",
            Operation::Render => "render",
            Operation::RenderAnimation => "render animation",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// How loudly the presentation side should surface an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The caller broke the controller's contract. A correct shell never shows these.
    Defect,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to load scene `{path}`: {reason}")]
    SceneLoadFailed { path: String, reason: String },
    #[error("Cannot {operation} while the job is {state}")]
    OperationNotAllowed { operation: Operation, state: JobState },
    #[error("A render is already running")]
    RunAlreadyActive,
    #[error("The loaded scene has no keyframed objects to animate")]
    NothingToAnimate,
    /// Carries the renderer's own message.
    #[error("{0}")]
    EngineFailure(String),
    #[error("Unable to switch working directory to `{path}`: {reason}")]
    WorkingDirectory { path: String, reason: String },
    #[error("Unable to start render worker: {0}")]
    WorkerSpawn(String),
}

impl JobError {
    pub fn severity(&self) -> Severity {
        match self {
            JobError::SceneLoadFailed { .. } => Severity::Error,
            JobError::NothingToAnimate => Severity::Warning,
            JobError::OperationNotAllowed { .. } | JobError::RunAlreadyActive => Severity::Defect,
            JobError::EngineFailure(_)
            | JobError::WorkingDirectory { .. }
            | JobError::WorkerSpawn(_) => Severity::Error,
        }
    }

    pub(crate) fn not_allowed(operation: Operation, state: JobState) -> Self {
        JobError::OperationNotAllowed { operation, state }
    }
}
