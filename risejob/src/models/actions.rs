use super::job::{Job, JobState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the single pause button does when pressed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseLabel {
    Pause,
    Resume,
}

impl fmt::Display for PauseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseLabel::Pause => f.write_str("Pause Rendering"),
            PauseLabel::Resume => f.write_str("Resume Rendering"),
        }
    }
}

/// Which operator controls are usable for the current job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actions {
    pub load: bool,
    pub predict: bool,
    pub render: bool,
    pub render_animation: bool,
    pub pause_resume: bool,
    pub stop: bool,
    pub pause_label: PauseLabel,
}

impl Actions {
    /// Derive the controls from the job alone, the shell keeps no state of its own.
    /// `allow_stop_while_paused` relaxes the rule that a parked render must be resumed before it can be stopped.
    pub fn for_job(job: &Job, allow_stop_while_paused: bool) -> Self {
        let idle = Self {
            load: false,
            predict: false,
            render: false,
            render_animation: false,
            pause_resume: false,
            stop: false,
            pause_label: PauseLabel::Pause,
        };

        match job.state() {
            JobState::Idle => Self { load: true, ..idle },
            JobState::SceneLoaded => Self {
                load: true,
                predict: true,
                render: true,
                render_animation: job.has_keyframed_objects(),
                ..idle
            },
            JobState::Running => Self {
                pause_resume: true,
                stop: true,
                ..idle
            },
            // resume only becomes possible once the worker confirmed it parked
            JobState::PendingPause => Self {
                stop: allow_stop_while_paused,
                pause_label: PauseLabel::Resume,
                ..idle
            },
            JobState::Paused => Self {
                pause_resume: true,
                stop: allow_stop_while_paused,
                pause_label: PauseLabel::Resume,
                ..idle
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn idle_only_allows_loading() {
        let actions = Actions::for_job(&Job::new(), false);
        assert!(actions.load);
        assert!(!actions.predict && !actions.render && !actions.render_animation);
        assert!(!actions.pause_resume && !actions.stop);
    }

    #[test]
    fn animation_follows_keyframes() {
        let mut job = Job::new();
        job.scene_loaded(PathBuf::from("/scenes/still.RISEscene"), false);
        assert!(!Actions::for_job(&job, false).render_animation);
        job.set_keyframed(true);
        let actions = Actions::for_job(&job, false);
        assert!(actions.load && actions.predict && actions.render && actions.render_animation);
        assert!(!actions.pause_resume && !actions.stop);
    }

    #[test]
    fn paused_hides_stop_unless_allowed() {
        let mut job = Job::new();
        job.scene_loaded(PathBuf::from("/scenes/still.RISEscene"), false);
        job.set_state(JobState::Paused);

        let strict = Actions::for_job(&job, false);
        assert!(strict.pause_resume);
        assert!(!strict.stop);
        assert_eq!(strict.pause_label.to_string(), "Resume Rendering");

        assert!(Actions::for_job(&job, true).stop);
    }

    #[test]
    fn pausing_offers_nothing_until_the_worker_parks() {
        let mut job = Job::new();
        job.scene_loaded(PathBuf::from("/scenes/still.RISEscene"), false);
        job.set_state(JobState::PendingPause);

        let actions = Actions::for_job(&job, false);
        assert!(!actions.pause_resume && !actions.stop && !actions.load);
        assert_eq!(actions.pause_label, PauseLabel::Resume);
    }
}
