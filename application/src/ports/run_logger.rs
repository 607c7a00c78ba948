//! Port for structured run-event logging.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures a machine-readable
//! record of the run (JSONL).

use serde_json::Value;

/// A structured run event for logging.
pub struct RunLogEvent {
    /// Event type identifier (e.g., "step", "verification", "completed").
    pub event_type: &'static str,
    pub payload: Value,
}

impl RunLogEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging run events to a structured log.
///
/// `log` is synchronous and infallible; logging failures are ignored so they
/// never disrupt the run.
pub trait RunEventLogger: Send + Sync {
    fn log(&self, event: RunLogEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoRunLogger;

impl RunEventLogger for NoRunLogger {
    fn log(&self, _event: RunLogEvent) {}
}
