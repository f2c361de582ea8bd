/*
    Console front end for the job controller. It owns the controller and prints what it reports,
    the controller decides what is allowed. Load and predict block the prompt until the renderer answers.

    Feature request:
        - A TUI panel with a progress bar instead of percentage lines would be nicer to look at.
*/
use crate::{
    models::{
        actions::{Actions, PauseLabel},
        error::{JobError, Severity},
        job::{JobEvent, JobState},
        render_run::RunOutcome,
    },
    services::controller::JobController,
};
use rise::{Engine, Mode};
use std::{path::PathBuf, str::FromStr};
use thiserror::Error;
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    select,
    sync::mpsc::UnboundedReceiver,
};
use tracing::{debug, info};

// progress is printed every time a run crosses one of these percentage steps
const PROGRESS_STEP: u64 = 10;

const HELP: &str = "\
Commands:
    load <path>   load a scene file
    predict       estimate how long a frame render takes
    render        render one frame
    animate       render the keyframed animation
    pause         pause or resume the current render
    resume        resume a paused render
    stop          stop the current render and discard the job
    about         show renderer information
    status        show the job state and the available controls
    quit          shut down and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    LoadScene(PathBuf),
    Predict,
    Render,
    RenderAnimation,
    TogglePause,
    Resume,
    Stop,
    About,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Nothing to do")]
    Empty,
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("Unknown command `{0}`, type `help` for a list")]
    Unknown(String),
}

impl FromStr for UiCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "load" | "open" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("load"));
                }
                // quotes let a path carry spaces
                UiCommand::LoadScene(PathBuf::from(rest.trim_matches('"')))
            }
            "predict" => UiCommand::Predict,
            "render" => UiCommand::Render,
            "animate" | "animation" => UiCommand::RenderAnimation,
            "pause" => UiCommand::TogglePause,
            "resume" => UiCommand::Resume,
            "stop" => UiCommand::Stop,
            "about" => UiCommand::About,
            "status" => UiCommand::Status,
            "help" | "?" => UiCommand::Help,
            "quit" | "exit" => UiCommand::Quit,
            _ => return Err(CommandError::Unknown(word.to_owned())),
        };
        Ok(command)
    }
}

pub struct CliApp<E: Engine> {
    controller: JobController<E>,
    events: UnboundedReceiver<JobEvent>,
    last_step: Option<u64>,
}

impl<E: Engine> CliApp<E> {
    pub fn new(mut controller: JobController<E>) -> Self {
        let events = controller.subscribe();
        Self {
            controller,
            events,
            last_step: None,
        }
    }

    pub fn controller(&self) -> &JobController<E> {
        &self.controller
    }

    /// Read commands from stdin until `quit` or end of input, then shut the controller down.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(stdin()).lines();
        self.print_events();
        println!("{}", describe_actions(&self.controller.actions()));

        loop {
            select! {
                line = lines.next_line() => match line? {
                    Some(line) => match line.parse::<UiCommand>() {
                        Ok(UiCommand::Quit) => break,
                        Ok(command) => println!("{}", self.handle_command(command)),
                        Err(CommandError::Empty) => {}
                        Err(e) => println!("{e}"),
                    },
                    None => break,
                },
                // stays pending while no run is active
                _ = self.controller.next_update() => {}
            }
            self.print_events();
        }

        info!("Shutting down");
        if self.controller.state().is_rendering() {
            println!("Cancelling the current render");
        }
        self.controller.shutdown();
        self.print_events();
        Ok(())
    }

    /// Run one command against the controller and return what the operator should read.
    pub fn handle_command(&mut self, command: UiCommand) -> String {
        debug!("Command {:?}", command);
        if let Some(reply) = self.unavailable(&command) {
            return reply;
        }
        let reply = match command {
            UiCommand::LoadScene(path) => self
                .controller
                .load_scene(&path)
                .map(|()| format!("Loaded {}", path.display())),
            UiCommand::Predict => self.controller.predict().map(|p| p.to_string()),
            UiCommand::Render => self
                .controller
                .start_render(Mode::Frame)
                .map(|id| format!("Rendering frame, run {id}")),
            UiCommand::RenderAnimation => self.controller.start_render(Mode::Animation).map(|id| {
                let options = self.controller.animation_options();
                format!(
                    "Rendering {} frames from {} to {}, run {id}",
                    options.num_frames, options.time_start, options.time_end
                )
            }),
            UiCommand::TogglePause => match self.controller.state() {
                JobState::Paused => {
                    self.controller.request_resume().map(|()| "Resuming".to_owned())
                }
                _ => self
                    .controller
                    .request_pause()
                    .map(|()| "Pausing at the next checkpoint".to_owned()),
            },
            UiCommand::Resume => self
                .controller
                .request_resume()
                .map(|()| "Resuming".to_owned()),
            UiCommand::Stop => self
                .controller
                .request_stop()
                .map(|outcome| format!("Stopped ({})", describe_outcome(&outcome))),
            UiCommand::About => Ok(self.controller.about().to_string()),
            UiCommand::Status => Ok(format!(
                "Job {} is {}\n{}",
                self.controller.job().id,
                self.controller.state(),
                describe_actions(&self.controller.actions())
            )),
            UiCommand::Help => Ok(HELP.to_owned()),
            UiCommand::Quit => Ok("Bye".to_owned()),
        };
        reply.unwrap_or_else(|e| describe_error(&e))
    }

    // commands the current controls do not offer never reach the controller
    fn unavailable(&self, command: &UiCommand) -> Option<String> {
        let actions = self.controller.actions();
        let resume_label = actions.pause_label == PauseLabel::Resume;
        let (name, enabled) = match command {
            UiCommand::LoadScene(_) => ("load", actions.load),
            UiCommand::Predict => ("predict", actions.predict),
            UiCommand::Render => ("render", actions.render),
            UiCommand::RenderAnimation => ("animate", actions.render_animation),
            UiCommand::TogglePause if resume_label => ("resume", actions.pause_resume),
            UiCommand::TogglePause => ("pause", actions.pause_resume),
            UiCommand::Resume => ("resume", actions.pause_resume && resume_label),
            UiCommand::Stop => ("stop", actions.stop),
            UiCommand::About | UiCommand::Status | UiCommand::Help | UiCommand::Quit => {
                return None
            }
        };
        if enabled {
            return None;
        }

        let state = self.controller.state();
        let hint = match (command, state) {
            (UiCommand::Stop, JobState::Paused) => ", resume first",
            (_, JobState::PendingPause) => ", wait for the render to pause",
            (UiCommand::RenderAnimation, JobState::SceneLoaded) => {
                ", the scene has no keyframed objects"
            }
            (UiCommand::Predict | UiCommand::Render | UiCommand::RenderAnimation, JobState::Idle) => {
                ", load a scene first"
            }
            _ => "",
        };
        Some(format!("{name} is unavailable while the job is {state}{hint}"))
    }

    fn print_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(text) = self.describe_event(&event) {
                println!("{text}");
            }
        }
    }

    fn describe_event(&mut self, event: &JobEvent) -> Option<String> {
        match event {
            JobEvent::StateChanged { state, actions } => {
                Some(format!("[{state}] {}", describe_actions(actions)))
            }
            JobEvent::Progress { done, total, .. } => {
                let step = progress_step(*done, *total);
                if self.last_step == Some(step) {
                    return None;
                }
                self.last_step = Some(step);
                Some(format!("[Running] {}% ({done}/{total})", step))
            }
            JobEvent::RunFinished { outcome, .. } => {
                self.last_step = None;
                Some(format!("Run {}", describe_outcome(outcome)))
            }
            JobEvent::Stopped { job_id } => Some(format!("Job {job_id} discarded")),
            JobEvent::Error { message, severity } => Some(tag(*severity, message)),
        }
    }
}

fn progress_step(done: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    let percent = done.min(total) * 100 / total;
    percent - percent % PROGRESS_STEP
}

fn describe_actions(actions: &Actions) -> String {
    let mut enabled = Vec::new();
    if actions.load {
        enabled.push("load".to_owned());
    }
    if actions.predict {
        enabled.push("predict".to_owned());
    }
    if actions.render {
        enabled.push("render".to_owned());
    }
    if actions.render_animation {
        enabled.push("animate".to_owned());
    }
    if actions.pause_resume {
        enabled.push(actions.pause_label.to_string());
    }
    if actions.stop {
        enabled.push("stop".to_owned());
    }
    format!("Available: {}", enabled.join(", "))
}

fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed => "completed".to_owned(),
        RunOutcome::Cancelled => "cancelled".to_owned(),
        RunOutcome::Failed(reason) => format!("failed: {reason}"),
    }
}

fn describe_error(err: &JobError) -> String {
    tag(err.severity(), &err.to_string())
}

fn tag(severity: Severity, message: &str) -> String {
    match severity {
        Severity::Info => format!("[Info] {message}"),
        Severity::Warning => format!("[Warning] {message}"),
        Severity::Error => format!("[ERR] {message}"),
        Severity::Defect => format!("[BUG] {message}"),
    }
}
