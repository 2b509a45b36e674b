// Error types for the topology fixture
//
// Every failure in this crate is fatal: the fixture has a single intended run
// shape and there is no recovery path. The types here exist so that a failure
// is reported with a stable code and a readable message before the process
// exits non-zero.

use log::error;
use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Fixture error code constants
///
/// Error code range: 3001-3010
pub struct FixtureErrorCodes {}

impl FixtureErrorCodes {
    /// The worker thread could not be spawned
    pub const WORKER_SPAWN_FAILED: i32 = 3001;

    /// The worker returned before reaching steady state
    pub const WORKER_EXITED_EARLY: i32 = 3002;

    /// The worker thread panicked
    pub const WORKER_PANICKED: i32 = 3003;

    /// A mutex guarding fixture state was poisoned
    pub const LOCK_POISONED: i32 = 3004;

    /// The topology registry was already published in this process
    pub const ALREADY_PUBLISHED: i32 = 3005;

    /// Writing or flushing the readiness token failed
    pub const CHANNEL_WRITE: i32 = 3006;

    /// Closing the handshake output channel failed
    pub const CHANNEL_CLOSE: i32 = 3007;

    /// Reading the release token failed
    pub const CHANNEL_READ: i32 = 3008;
}

/// Log a fixture error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_fixture_error(err: &FixtureError, context: &str) {
    error!(
        "Fixture error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        err.component(),
        err.message()
    );
}

/// Fixture setup and rendezvous errors
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureError {
    /// Spawning the worker thread failed
    WorkerSpawnFailed { reason: String },

    /// The worker routine returned without ever reporting readiness
    WorkerExitedEarly,

    /// The worker routine panicked
    WorkerPanicked,

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// `publish` was called twice
    AlreadyPublished,

    /// Readiness token could not be written or flushed
    ChannelWrite { reason: String },

    /// Output channel could not be closed
    ChannelClose { reason: String },

    /// Release token could not be read
    ChannelRead { reason: String },
}

impl FixtureError {
    /// Component that raised the error, used in log lines
    pub fn component(&self) -> &'static str {
        match self {
            FixtureError::WorkerSpawnFailed { .. }
            | FixtureError::WorkerExitedEarly
            | FixtureError::WorkerPanicked
            | FixtureError::LockPoisoned { .. } => "WorkerBarrier",
            FixtureError::AlreadyPublished => "TopologyRegistry",
            FixtureError::ChannelWrite { .. }
            | FixtureError::ChannelClose { .. }
            | FixtureError::ChannelRead { .. } => "InspectorHandshake",
        }
    }
}

impl ErrorCode for FixtureError {
    fn code(&self) -> i32 {
        match self {
            FixtureError::WorkerSpawnFailed { .. } => FixtureErrorCodes::WORKER_SPAWN_FAILED,
            FixtureError::WorkerExitedEarly => FixtureErrorCodes::WORKER_EXITED_EARLY,
            FixtureError::WorkerPanicked => FixtureErrorCodes::WORKER_PANICKED,
            FixtureError::LockPoisoned { .. } => FixtureErrorCodes::LOCK_POISONED,
            FixtureError::AlreadyPublished => FixtureErrorCodes::ALREADY_PUBLISHED,
            FixtureError::ChannelWrite { .. } => FixtureErrorCodes::CHANNEL_WRITE,
            FixtureError::ChannelClose { .. } => FixtureErrorCodes::CHANNEL_CLOSE,
            FixtureError::ChannelRead { .. } => FixtureErrorCodes::CHANNEL_READ,
        }
    }

    fn message(&self) -> String {
        match self {
            FixtureError::WorkerSpawnFailed { reason } => {
                format!("Failed to spawn worker thread: {}", reason)
            }
            FixtureError::WorkerExitedEarly => {
                "Worker exited before reaching steady state".to_string()
            }
            FixtureError::WorkerPanicked => "Worker thread panicked".to_string(),
            FixtureError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            FixtureError::AlreadyPublished => {
                "Topology already published; only one session per process".to_string()
            }
            FixtureError::ChannelWrite { reason } => {
                format!("Failed to write readiness token: {}", reason)
            }
            FixtureError::ChannelClose { reason } => {
                format!("Failed to close output channel: {}", reason)
            }
            FixtureError::ChannelRead { reason } => {
                format!("Failed to read release token: {}", reason)
            }
        }
    }
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FixtureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FixtureError {}
