/*
    Developer blog:
    - One render run = one named OS thread. The renderer call blocks for minutes, so it gets a real
      thread instead of a tokio task. Everything the thread has to say goes back over a channel;
      the controller is the only one allowed to act on it.
    - Nothing ever suspends or kills this thread from outside. The renderer calls our checkpoint
      once per rendering unit and that is where pause and cancel are honoured.
    - A panicking renderer is caught and reported as a failed run so the controller never waits
      on a run that will not report back.
*/
use crate::models::render_run::{RenderRun, RunOutcome, RunSignals};
use crate::services::working_dir::WorkingDir;
use rise::{Engine, Progress, RenderEnd};
use std::{
    any::Any,
    cell::Cell,
    io,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Messages from a worker thread to its controller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress { run_id: Uuid, done: u64, total: u64 },
    /// Worker reached a checkpoint with a pause pending and is now asleep.
    Parked { run_id: Uuid },
    Resumed { run_id: Uuid },
    /// Always the last message of a run.
    Finished { run_id: Uuid, outcome: RunOutcome },
}

/// Checkpoint handed to the renderer for one run.
struct RunCheckpoint<'a> {
    run_id: Uuid,
    signals: &'a RunSignals,
    interval: u64,
    calls: Cell<u64>,
    events: &'a UnboundedSender<WorkerEvent>,
}

impl<'a> RunCheckpoint<'a> {
    fn new(run: &'a RenderRun, interval: u32, events: &'a UnboundedSender<WorkerEvent>) -> Self {
        Self {
            run_id: run.id,
            signals: &run.signals,
            interval: u64::from(interval.max(1)),
            calls: Cell::new(0),
            events,
        }
    }

    fn send(&self, event: WorkerEvent) {
        // controller gone means nobody is listening, the run still has to unwind normally
        let _ = self.events.send(event);
    }
}

impl Progress for RunCheckpoint<'_> {
    fn progress(&self, done: u64, total: u64) -> bool {
        self.send(WorkerEvent::Progress {
            run_id: self.run_id,
            done,
            total,
        });

        let call = self.calls.get();
        self.calls.set(call + 1);
        if call % self.interval != 0 {
            return true;
        }

        let run_id = self.run_id;
        self.signals.wait_while_paused(
            || {
                debug!("Run {run_id} parked at {done}/{total}");
                self.send(WorkerEvent::Parked { run_id });
            },
            || {
                debug!("Run {run_id} woke up");
                self.send(WorkerEvent::Resumed { run_id });
            },
        )
    }
}

/// Controller side handle of a running worker thread.
pub struct Worker {
    run: RenderRun,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start `run` on a new thread. The engine lock is held for the whole render call,
    /// inside a working directory guard rooted at `scene_dir` when one is known.
    pub fn spawn<E: Engine>(
        engine: Arc<Mutex<E>>,
        run: RenderRun,
        scene_dir: Option<PathBuf>,
        checkpoint_interval: u32,
        events: UnboundedSender<WorkerEvent>,
    ) -> io::Result<Self> {
        let owned = run.clone();
        let handle = thread::Builder::new()
            .name(format!("render-{}", run.kind))
            .spawn(move || {
                info!("Run {} ({}) started", owned.id, owned.kind);
                let outcome = execute(
                    &engine,
                    &owned,
                    scene_dir.as_deref(),
                    checkpoint_interval,
                    &events,
                );
                info!("Run {} ended: {:?}", owned.id, outcome);
                let _ = events.send(WorkerEvent::Finished {
                    run_id: owned.id,
                    outcome,
                });
            })?;

        Ok(Self {
            run,
            handle: Some(handle),
        })
    }

    pub fn run(&self) -> &RenderRun {
        &self.run
    }

    pub fn id(&self) -> Uuid {
        self.run.id
    }

    pub fn signals(&self) -> &RunSignals {
        &self.run.signals
    }

    /// Wait for the thread to exit. Only returns quickly once the run finished or was cancelled.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                // execute() catches renderer panics, so this is our own bug
                error!("Render worker for run {} panicked", self.run.id);
            }
        }
    }
}

impl Drop for Worker {
    // never leave a thread parked past the lifetime of its handle
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("Dropping live worker for run {}, cancelling it", self.run.id);
            self.run.signals.request_cancel();
            self.run.signals.request_resume();
            self.join();
        }
    }
}

fn execute<E: Engine>(
    engine: &Mutex<E>,
    run: &RenderRun,
    scene_dir: Option<&Path>,
    checkpoint_interval: u32,
    events: &UnboundedSender<WorkerEvent>,
) -> RunOutcome {
    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);

    // dropped before the engine lock, so the directory is back before anyone else can render
    let _cwd = match WorkingDir::enter_optional(scene_dir) {
        Ok(guard) => guard,
        Err(e) => {
            return RunOutcome::Failed(format!(
                "unable to enter scene directory {:?}: {e}",
                scene_dir
            ))
        }
    };

    let checkpoint = RunCheckpoint::new(run, checkpoint_interval, events);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.render(run.kind, &checkpoint)
    }));

    match result {
        Ok(Ok(RenderEnd::Finished)) => RunOutcome::Completed,
        Ok(Ok(RenderEnd::Abandoned)) => RunOutcome::Cancelled,
        Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
        Err(payload) => RunOutcome::Failed(panic_message(payload.as_ref())),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("renderer panicked: {detail}")
}
