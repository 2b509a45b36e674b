// Topology Fixture - debugger inspection target
// Builds a frozen memory topology, then rendezvous with an attached inspector

// Module declarations
pub mod config;
pub mod error;
pub mod handshake;
pub mod observe;
pub mod sequencer;
pub mod topology;

cfg_if::cfg_if! {
    if #[cfg(feature = "extended")] {
        pub mod worker;
    }
}

// Re-exports for convenience
pub use config::FixtureConfig;
pub use error::{ErrorCode, FixtureError};
pub use handshake::{InspectorHandshake, Release};
pub use sequencer::{Sequencer, SessionReport};

/// Initialize logging
///
/// Logs go to stderr: stdout carries the handshake token and nothing else.
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(level: tracing::Level) {
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init();

    if installed.is_ok() {
        log::debug!("Logging initialized at {}", level);
    }
}
