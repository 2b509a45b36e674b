//! Timing and token settings for a fixture session
//!
//! The fixture has no configuration file and no environment lookups. The
//! defaults below reproduce the reference run; the CLI may tighten or relax the
//! two polling intervals for slow CI hosts.

use std::time::Duration;

/// Readiness token written to the handshake output channel
pub const DEFAULT_READY_TOKEN: &str = "ready";

/// Interval between readiness checks and between worker heartbeats
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1);

/// Complete session configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureConfig {
    /// How often the sequencer polls the worker readiness flag
    pub readiness_poll: Duration,
    /// How long the worker sleeps between steady-state iterations
    pub heartbeat: Duration,
    /// Bytes written to the output channel once the fixture is frozen
    pub ready_token: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            readiness_poll: DEFAULT_INTERVAL,
            heartbeat: DEFAULT_INTERVAL,
            ready_token: DEFAULT_READY_TOKEN.to_string(),
        }
    }
}

impl FixtureConfig {
    pub fn with_readiness_poll(mut self, interval: Duration) -> Self {
        self.readiness_poll = non_zero(interval);
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = non_zero(interval);
        self
    }

}

// A zero interval turns both loops into hot spins.
fn non_zero(interval: Duration) -> Duration {
    if interval.is_zero() {
        log::warn!("[Config] Zero interval requested, using {:?}", DEFAULT_INTERVAL);
        DEFAULT_INTERVAL
    } else {
        interval
    }
}
