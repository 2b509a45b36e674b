use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use topology_fixture::{init_logging, FixtureConfig, Sequencer};

#[derive(Parser, Debug)]
#[command(
    name = "fixture_uut",
    about = "Builds a frozen memory topology and waits for an attached inspector"
)]
struct Cli {
    /// Interval between worker readiness checks (milliseconds).
    #[arg(long, default_value_t = 1)]
    poll_ms: u64,
    /// Worker sleep between steady-state iterations (milliseconds).
    #[arg(long, default_value_t = 1)]
    heartbeat_ms: u64,
    /// Log verbosity; logs always go to stderr.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fixture_uut error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.into());

    let config = FixtureConfig::default()
        .with_readiness_poll(Duration::from_millis(cli.poll_ms))
        .with_heartbeat(Duration::from_millis(cli.heartbeat_ms));

    let report = Sequencer::new(config)
        .run()
        .context("running inspector session")?;
    tracing::info!("released by {:?}", report.release);
    Ok(())
}
