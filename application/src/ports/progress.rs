//! Progress notification port
//!
//! Defines the interface for reporting progress during a run.
//! Implementations live in the presentation layer (console) and can be
//! fanned out with [`CompositeProgress`].

use cohort_domain::{RunPhase, RunStatus, SubagentRole, VerificationMode};
use serde::Serialize;

/// A progress event emitted by the run orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        run_id: String,
        goal: String,
        dry_run: bool,
    },
    Status {
        phase: RunPhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit_id: Option<String>,
        message: String,
    },
    Step {
        unit_id: String,
        role: SubagentRole,
        action: String,
        summary: String,
        duration_ms: u64,
    },
    Verification {
        mode: VerificationMode,
        command: String,
        ok: bool,
        attempt: usize,
        flaky_recovered: bool,
    },
    Completed {
        status: RunStatus,
        summary: String,
    },
    Failed {
        error: String,
    },
}

impl ProgressEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Started { .. } => "started",
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::Step { .. } => "step",
            ProgressEvent::Verification { .. } => "verification",
            ProgressEvent::Completed { .. } => "completed",
            ProgressEvent::Failed { .. } => "failed",
        }
    }

    pub fn status(phase: RunPhase, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            phase,
            unit_id: None,
            message: message.into(),
        }
    }

    pub fn unit_status(phase: RunPhase, unit_id: &str, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            phase,
            unit_id: Some(unit_id.to_string()),
            message: message.into(),
        }
    }
}

/// Callback for progress updates during a run
pub trait RunProgressNotifier: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl RunProgressNotifier for NoProgress {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// A progress notifier that delegates to multiple inner notifiers.
pub struct CompositeProgress {
    delegates: Vec<std::sync::Arc<dyn RunProgressNotifier>>,
}

impl CompositeProgress {
    pub fn new(delegates: Vec<std::sync::Arc<dyn RunProgressNotifier>>) -> Self {
        Self { delegates }
    }
}

impl RunProgressNotifier for CompositeProgress {
    fn on_event(&self, event: &ProgressEvent) {
        for d in &self.delegates {
            d.on_event(event);
        }
    }
}
