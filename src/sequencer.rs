//! Construction sequencer
//!
//! Drives one fixture session from start to exit:
//! 1. reset the capability flag through an observable store
//! 2. build and publish the topology (scalars, aggregates, containers,
//!    pointer graphs, owning slots)
//! 3. start the worker and wait for its steady state (extended build only)
//! 4. run the inspector handshake
//! 5. stop and join the worker
//!
//! Nothing published in step 2 is touched again until the handshake returns.
//! The session is claimed before step 1; a refused second session returns
//! without touching any of it.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::FixtureConfig;
use crate::error::{log_fixture_error, FixtureError};
use crate::handshake::{InspectorHandshake, OutputChannel, Release};
use crate::observe;
use crate::topology::{self, Sample, SampleRef, Topology, HAVE_EXTENDED};

static SESSION_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Capability flag as seen at readiness
    pub extended: bool,
    pub release: Release,
    /// When the worker's private object was constructed
    pub worker_constructed_at: Option<Instant>,
    /// When the sequencer first saw the worker's ready flag
    pub worker_ready_at: Option<Instant>,
}

pub struct Sequencer {
    config: FixtureConfig,
}

impl Sequencer {
    pub fn new(config: FixtureConfig) -> Self {
        Self { config }
    }

    /// Runs the session against the process stdout/stdin.
    pub fn run(&self) -> Result<SessionReport, FixtureError> {
        let handshake = InspectorHandshake::stdio(self.config.ready_token.clone());
        self.run_with(handshake)
    }

    /// Runs the session against the given handshake channels.
    ///
    /// Only one session may run per process; a second call fails with
    /// [`FixtureError::AlreadyPublished`] before anything is written or built.
    pub fn run_with<W, R>(
        &self,
        handshake: InspectorHandshake<W, R>,
    ) -> Result<SessionReport, FixtureError>
    where
        W: OutputChannel,
        R: BufRead,
    {
        claim_session().inspect_err(|err| {
            log_fixture_error(err, "claim_session");
        })?;

        observe::raise(&HAVE_EXTENDED, false);

        let local = Sample::new();
        local.pinned_value();
        let local_ref = SampleRef::new(&local);
        local_ref.pinned_value();

        let published = topology::publish(Topology::build()).inspect_err(|err| {
            log_fixture_error(err, "publish");
        })?;
        tracing::info!(
            "[Sequencer] Topology published (extended={})",
            topology::have_extended()
        );

        let mut worker = start_worker(&self.config).inspect_err(|err| {
            log_fixture_error(err, "start_worker");
        })?;

        let extended = topology::have_extended();
        let release = handshake
            .announce_ready_and_wait_for_release()
            .inspect_err(|err| {
                log_fixture_error(err, "handshake");
            })?;

        observe::keep(&local_ref);
        observe::keep(published);

        let mut report = SessionReport {
            extended,
            release,
            worker_constructed_at: None,
            worker_ready_at: None,
        };
        stop_worker(&mut worker, &mut report).inspect_err(|err| {
            log_fixture_error(err, "shutdown");
        })?;

        tracing::info!("[Sequencer] Session complete");
        Ok(report)
    }
}

fn claim_session() -> Result<(), FixtureError> {
    if SESSION_CLAIMED.swap(true, Ordering::SeqCst) {
        return Err(FixtureError::AlreadyPublished);
    }
    Ok(())
}

cfg_if::cfg_if! {
    if #[cfg(feature = "extended")] {
        use crate::worker::{spawn_worker, WorkerHandle};

        fn start_worker(config: &FixtureConfig) -> Result<WorkerHandle, FixtureError> {
            let mut handle = spawn_worker(config.heartbeat)?;
            handle.wait_until_ready(config.readiness_poll)?;
            Ok(handle)
        }

        fn stop_worker(
            handle: &mut WorkerHandle,
            report: &mut SessionReport,
        ) -> Result<(), FixtureError> {
            report.worker_constructed_at = handle.signals().constructed_at();
            report.worker_ready_at = handle.ready_observed_at();
            handle.shutdown()
        }
    } else {
        /// Stand-in for the worker in the baseline build
        struct NoWorker;

        fn start_worker(_config: &FixtureConfig) -> Result<NoWorker, FixtureError> {
            Ok(NoWorker)
        }

        fn stop_worker(
            _worker: &mut NoWorker,
            _report: &mut SessionReport,
        ) -> Result<(), FixtureError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    use super::*;
    use crate::handshake::testing::{recording, ChannelEvent, RecordingInput};
    use crate::topology::{registry, CYCLE_A, CYCLE_B};

    /// Checks what the inspector would see at the moment of readiness.
    fn readiness_violations() -> Vec<String> {
        let mut violations = Vec::new();
        let Some(published) = registry() else {
            violations.push("registry not published at readiness".to_string());
            return violations;
        };

        if published.ints.len() != 3 || published.samples.len() != 2 {
            violations.push("containers incomplete".to_string());
        }
        match CYCLE_A.linked().and_then(Sample::linked) {
            Some(back) if std::ptr::eq(back, &CYCLE_A) => {}
            _ => violations.push("cycle not closed".to_string()),
        }
        if !CYCLE_B.is_linked() {
            violations.push("cycle B unlinked".to_string());
        }

        #[cfg(feature = "extended")]
        {
            let owned = &published.owned;
            if !topology::have_extended() {
                violations.push("capability flag not raised".to_string());
            }
            if owned.unique_int_null.is_some()
                || owned.unique_sample_null.is_some()
                || owned.shared_sample_null.is_some()
            {
                violations.push("null slot populated".to_string());
            }
            if owned.unique_int.as_deref() != Some(&66)
                || owned.unique_sample.is_none()
                || owned.shared_int.as_deref() != Some(&66)
                || owned.shared_sample.is_none()
                || owned.shared_sample_peer.is_none()
            {
                violations.push("populated slot empty".to_string());
            }
        }
        violations
    }

    /// What a refused second session left behind
    struct SecondSession {
        outcome: Result<SessionReport, FixtureError>,
        extended_before: bool,
        extended_after: bool,
        events: Vec<ChannelEvent>,
    }

    fn attempt_second_session(sequencer: &Sequencer) -> SecondSession {
        let extended_before = topology::have_extended();
        let (trace, output, input) = recording(b"again");
        let outcome = sequencer.run_with(InspectorHandshake::new(output, input, "ready"));
        let extended_after = topology::have_extended();
        let events = trace.borrow().clone();
        SecondSession {
            outcome,
            extended_before,
            extended_after,
            events,
        }
    }

    #[test]
    fn session_freezes_topology_before_release_and_runs_once() {
        let sequencer = Sequencer::new(FixtureConfig::default());
        let violations = RefCell::new(None);
        let frozen_window = RefCell::new(None);

        let (trace, output, _) = recording(b"");
        let input = RecordingInput {
            trace: Rc::clone(&trace),
            data: Cursor::new(b"done".to_vec()),
            on_first_read: Some(|| {
                *violations.borrow_mut() = Some(readiness_violations());
                *frozen_window.borrow_mut() = Some(attempt_second_session(&sequencer));
            }),
        };

        let report = sequencer
            .run_with(InspectorHandshake::new(output, input, "ready"))
            .unwrap();

        assert_eq!(report.release, Release::Token("done".to_string()));
        let seen = violations
            .borrow_mut()
            .take()
            .expect("readiness checked at the first read");
        assert!(seen.is_empty(), "readiness violations: {:?}", seen);

        // A session started while the first one is frozen is refused without
        // touching the capability flag or the channels.
        let second = frozen_window
            .borrow_mut()
            .take()
            .expect("second session attempted at the first read");
        assert_eq!(second.outcome.unwrap_err(), FixtureError::AlreadyPublished);
        assert_eq!(second.extended_before, second.extended_after);
        assert_eq!(second.extended_after, cfg!(feature = "extended"));
        assert!(second.events.is_empty());

        assert_eq!(
            trace.borrow()[0],
            ChannelEvent::Write(b"ready".to_vec()),
            "token is the first thing written"
        );

        #[cfg(feature = "extended")]
        {
            assert!(report.extended);
            let constructed = report.worker_constructed_at.expect("worker object built");
            let ready = report.worker_ready_at.expect("worker readiness observed");
            assert!(constructed <= ready);
        }
        #[cfg(not(feature = "extended"))]
        {
            assert!(!report.extended);
            assert!(report.worker_ready_at.is_none());
        }

        // Once the first session has finished, later ones are still refused.
        let after = attempt_second_session(&sequencer);
        assert_eq!(after.outcome.unwrap_err(), FixtureError::AlreadyPublished);
        assert!(after.events.is_empty());
    }
}
