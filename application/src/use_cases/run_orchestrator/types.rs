//! Type definitions for the run orchestrator.

use crate::use_cases::shared::Cancelled;
use chrono::{DateTime, Utc};
use cohort_domain::{
    ArtifactRecord, ChangeJournalEntry, Clarification, ClarificationQuestion,
    ObservabilitySummary, RollbackReport, RunStatus, SynthesisOutput, UnitFailureCategory,
    VerificationOutcome, WorkUnitState,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that end a run without a report.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    #[error("Goal must not be empty")]
    EmptyGoal,

    #[error("Operation cancelled")]
    Cancelled,
}

impl RunError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

impl From<Cancelled> for RunError {
    fn from(_: Cancelled) -> Self {
        RunError::Cancelled
    }
}

/// Input for one run.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub goal: String,
    pub clarification: Clarification,
}

impl RunInput {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            clarification: Clarification::default(),
        }
    }

    pub fn with_clarification(mut self, clarification: Clarification) -> Self {
        self.clarification = clarification;
        self
    }
}

/// Budgets consumed against their limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub iterations_used: usize,
    pub max_iterations: usize,
    pub file_writes_used: usize,
    pub max_file_writes: usize,
    pub command_runs_used: usize,
    pub max_command_runs: usize,
    pub replans_used: usize,
    pub max_replans: usize,
}

/// Per-unit and per-role detail of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MultiAgentReport {
    pub strategy: String,
    pub work_units: Vec<WorkUnitState>,
    pub artifacts: BTreeMap<String, Vec<ArtifactRecord>>,
    pub quarantined_commands: Vec<String>,
    pub observability: ObservabilitySummary,
    pub failure_heatmap: BTreeMap<UnitFailureCategory, u64>,
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub goal: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_note: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Required questions still unanswered (only for `needs_clarification`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<ClarificationQuestion>,
    pub budgets: BudgetUsage,
    pub preflight: Option<VerificationOutcome>,
    pub final_verification: Option<VerificationOutcome>,
    pub change_journal: Vec<ChangeJournalEntry>,
    pub files_written: Vec<String>,
    pub rollback: Option<RollbackReport>,
    pub synthesis: SynthesisOutput,
    pub multi_agent_report: MultiAgentReport,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn unit_count(&self) -> usize {
        self.multi_agent_report.work_units.len()
    }
}
