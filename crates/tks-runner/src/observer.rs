//! Run progress reporting.

use std::time::Duration;

use tracing::{info, warn};

use crate::engine::RunOutcome;

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Neutral information.
    Info(String),
    /// A run finished successfully.
    Success(String),
    /// Something the user should look at (e.g. an aborted run).
    Warning(String),
    /// A failure.
    Error(String),
}

impl Notice {
    /// Message text.
    pub fn message(&self) -> &str {
        match self {
            Self::Info(m) | Self::Success(m) | Self::Warning(m) | Self::Error(m) => m,
        }
    }
}

/// Receives progress from the [`ExecutionEngine`](crate::ExecutionEngine).
///
/// Every method has an empty default so observers only implement what they display.
pub trait RunObserver: Send + Sync {
    /// A full-script run started.
    fn script_started(&self, _total: usize) {}

    /// Step `step` (1-based) of `total` is about to be dispatched.
    fn step_started(&self, _step: usize, _total: usize, _line_number: usize, _text: &str) {}

    /// Step `step` succeeded.
    fn step_succeeded(&self, _step: usize, _elapsed: Duration) {}

    /// Step `step` failed.
    fn step_failed(&self, _step: usize, _message: &str) {}

    /// The run reached a terminal state.
    fn script_finished(&self, _outcome: &RunOutcome, _elapsed: Duration) {}

    /// A user-facing notice.
    fn notice(&self, _notice: &Notice) {}
}

/// Observer that writes everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn script_started(&self, total: usize) {
        info!(total, "script started");
    }

    fn step_started(&self, step: usize, total: usize, line_number: usize, text: &str) {
        info!(step, total, line = line_number, command = text, "step started");
    }

    fn step_succeeded(&self, step: usize, elapsed: Duration) {
        info!(step, elapsed_ms = elapsed.as_millis() as u64, "step succeeded");
    }

    fn step_failed(&self, step: usize, message: &str) {
        warn!(step, error = message, "step failed");
    }

    fn script_finished(&self, outcome: &RunOutcome, elapsed: Duration) {
        info!(?outcome, elapsed_ms = elapsed.as_millis() as u64, "script finished");
    }

    fn notice(&self, notice: &Notice) {
        match notice {
            Notice::Info(m) | Notice::Success(m) => info!(notice = %m),
            Notice::Warning(m) | Notice::Error(m) => warn!(notice = %m),
        }
    }
}
