//! Worker lifecycle barrier.
//!
//! The worker owns one private `Sample` on its own stack. The barrier makes
//! sure that object is fully constructed and the worker is parked in its
//! steady-state loop before the sequencer moves on, and that the object is
//! only torn down after the sequencer sets the finish flag.
//!
//! Phases: `NotStarted -> Starting -> SteadyState -> Stopping -> Terminated`.
//! `Terminated` is only entered by [`WorkerHandle::shutdown`] once the thread
//! has been joined.
//! The mutex in [`WorkerSignals`] is held only while the private object is
//! being built or dropped.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::error::FixtureError;
use crate::observe;
use crate::topology::Sample;


/// Lifecycle phase of the worker thread
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    NotStarted = 0,
    Starting = 1,
    SteadyState = 2,
    Stopping = 3,
    Terminated = 4,
}

impl WorkerPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WorkerPhase::Starting,
            2 => WorkerPhase::SteadyState,
            3 => WorkerPhase::Stopping,
            4 => WorkerPhase::Terminated,
            _ => WorkerPhase::NotStarted,
        }
    }
}

/// State shared between the sequencer and the worker
#[derive(Debug)]
pub struct WorkerSignals {
    phase: AtomicU8,
    ready: AtomicBool,
    finish: AtomicBool,
    object_guard: Mutex<()>,
    constructed_at: OnceCell<Instant>,
}

impl WorkerSignals {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(WorkerPhase::NotStarted as u8),
            ready: AtomicBool::new(false),
            finish: AtomicBool::new(false),
            object_guard: Mutex::new(()),
            constructed_at: OnceCell::new(),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        WorkerPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn finish_requested(&self) -> bool {
        self.finish.load(Ordering::Acquire)
    }

    /// When the worker's private object finished construction
    pub fn constructed_at(&self) -> Option<Instant> {
        self.constructed_at.get().copied()
    }

    fn enter(&self, phase: WorkerPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        tracing::debug!("[Worker] Entered {:?}", phase);
    }

    /// Acquire the construction/destruction lock
    ///
    /// Returns MutexGuard or FixtureError::LockPoisoned on lock failure
    fn lock_object(&self) -> Result<MutexGuard<'_, ()>, FixtureError> {
        self.object_guard
            .lock()
            .map_err(|_| FixtureError::LockPoisoned {
                component: "worker_object".to_string(),
            })
    }
}

/// Handle owned by the sequencer
pub struct WorkerHandle {
    signals: Arc<WorkerSignals>,
    thread: Option<JoinHandle<Result<(), FixtureError>>>,
    ready_observed_at: Option<Instant>,
}

impl WorkerHandle {
    pub fn signals(&self) -> &WorkerSignals {
        &self.signals
    }

    pub fn phase(&self) -> WorkerPhase {
        self.signals.phase()
    }

    /// When the sequencer first saw the ready flag set
    pub fn ready_observed_at(&self) -> Option<Instant> {
        self.ready_observed_at
    }

    /// Polls the ready flag every `poll` until the worker reports steady state.
    ///
    /// No timeout. Fails only if the worker thread ends without ever becoming
    /// ready.
    pub fn wait_until_ready(&mut self, poll: Duration) -> Result<Instant, FixtureError> {
        if let Some(observed) = self.ready_observed_at {
            return Ok(observed);
        }

        loop {
            if self.signals.is_ready() {
                let observed = Instant::now();
                self.ready_observed_at = Some(observed);
                tracing::info!("[Worker] Steady state observed");
                return Ok(observed);
            }

            let exited = self
                .thread
                .as_ref()
                .map_or(true, |thread| thread.is_finished());
            if exited && !self.signals.is_ready() {
                return Err(FixtureError::WorkerExitedEarly);
            }

            thread::sleep(poll);
        }
    }

    /// Sets the finish flag and joins the worker.
    ///
    /// Calling this again after the worker has been joined does nothing.
    pub fn shutdown(&mut self) -> Result<(), FixtureError> {
        self.signals.finish.store(true, Ordering::Release);

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let outcome = match thread.join() {
            Ok(result) => {
                self.signals.enter(WorkerPhase::Terminated);
                result
            }
            Err(_) => Err(FixtureError::WorkerPanicked),
        };
        tracing::info!("[Worker] Joined ({:?})", self.signals.phase());
        outcome
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Starts the worker thread. It sleeps `heartbeat` between steady-state
/// iterations.
pub fn spawn_worker(heartbeat: Duration) -> Result<WorkerHandle, FixtureError> {
    let signals = Arc::new(WorkerSignals::new());
    let worker_signals = Arc::clone(&signals);

    let thread = thread::Builder::new()
        .name("fixture-worker".to_string())
        .spawn(move || run_worker(&worker_signals, heartbeat))
        .map_err(|err| FixtureError::WorkerSpawnFailed {
            reason: err.to_string(),
        })?;

    Ok(WorkerHandle {
        signals,
        thread: Some(thread),
        ready_observed_at: None,
    })
}

fn run_worker(signals: &WorkerSignals, heartbeat: Duration) -> Result<(), FixtureError> {
    signals.enter(WorkerPhase::Starting);

    let private = {
        let _guard = signals.lock_object()?;
        let sample = Sample::unlabelled();
        sample.pinned_value();
        let _ = signals.constructed_at.set(Instant::now());
        sample
    };

    signals.enter(WorkerPhase::SteadyState);
    observe::raise(&signals.ready, true);
    while !signals.finish_requested() {
        observe::raise(&signals.ready, true);
        observe::keep(&private);
        thread::sleep(heartbeat);
    }

    signals.enter(WorkerPhase::Stopping);
    {
        let _guard = signals.lock_object()?;
        drop(private);
    }

    Ok(())
}
