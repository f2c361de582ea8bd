use chrono::{DateTime, Utc};
use rise::Mode;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex, PoisonError,
};
use uuid::Uuid;

/// How a render run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    /// Stop was acknowledged. Expected, not an error.
    Cancelled,
    Failed(String),
}

/// Flags shared between the controller and the worker of one run.
/// Cancel and pause are plain atomics polled at checkpoints. The mutex and condvar only exist
/// so a parked worker can sleep instead of spinning.
#[derive(Debug, Default)]
pub struct RunSignals {
    cancel: AtomicBool,
    pause: AtomicBool,
    parked: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

impl RunSignals {
    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    /// Worker is currently sleeping at a checkpoint.
    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire)
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        self.notify();
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::Release);
    }

    pub fn request_resume(&self) {
        self.pause.store(false, Ordering::Release);
        self.notify();
    }

    // taking the gate before notifying closes the window between the worker checking the
    // flags and going to sleep.
    fn notify(&self) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake.notify_all();
    }

    /// Park the calling worker while a pause is requested and no cancel is.
    /// `on_park` runs once before sleeping, `on_wake` once after, only if the worker actually parked.
    /// Returns `false` when the run must stop.
    pub fn wait_while_paused(&self, on_park: impl FnOnce(), on_wake: impl FnOnce()) -> bool {
        if self.cancel_requested() {
            return false;
        }
        if !self.pause_requested() {
            return true;
        }

        self.parked.store(true, Ordering::Release);
        on_park();
        {
            let gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            let _gate = self
                .wake
                .wait_while(gate, |_| self.pause_requested() && !self.cancel_requested())
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.parked.store(false, Ordering::Release);
        on_wake();

        !self.cancel_requested()
    }
}

/// One execution of a frame or animation render.
/// The worker thread owns it; the controller keeps a clone of `signals` to steer it.
#[derive(Debug, Clone)]
pub struct RenderRun {
    pub id: Uuid,
    pub kind: Mode,
    pub started_at: DateTime<Utc>,
    pub signals: Arc<RunSignals>,
}

impl RenderRun {
    pub fn new(kind: Mode) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            started_at: Utc::now(),
            signals: Arc::new(RunSignals::default()),
        }
    }
}
