//! Tracing setup with a runtime-adjustable level.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::common::error::{CommandError, CommandResult};

/// Levels the owner may switch to at runtime.
pub const LOG_LEVELS: [&str; 3] = ["warn", "info", "debug"];

/// Handle used by `!loglevel` to swap the active filter.
#[derive(Clone)]
pub struct LogHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> CommandResult<()> {
        let level = parse_level(level)?;
        self.inner
            .reload(EnvFilter::new(level))
            .map_err(|e| CommandError::LogReload(e.to_string()))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_logging() -> LogHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, inner) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogHandle { inner }
}

/// Normalize a level name, rejecting anything outside [`LOG_LEVELS`].
pub fn parse_level(level: &str) -> CommandResult<&'static str> {
    let lowered = level.trim().to_lowercase();
    LOG_LEVELS
        .iter()
        .find(|candidate| **candidate == lowered)
        .copied()
        .ok_or_else(|| CommandError::InvalidLogLevel(level.trim().to_string()))
}
