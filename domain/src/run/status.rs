//! Run status and terminal-status derivation

use crate::work_unit::entities::{UnitStatus, WorkUnitState};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    VerificationFailed,
    MaxIterations,
    NeedsClarification,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::VerificationFailed => "verification_failed",
            RunStatus::MaxIterations => "max_iterations",
            RunStatus::NeedsClarification => "needs_clarification",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Clarifying,
    Planning,
    Preflight,
    Scheduling,
    FinalVerification,
    Synthesis,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Clarifying => "clarifying",
            RunPhase::Planning => "planning",
            RunPhase::Preflight => "preflight",
            RunPhase::Scheduling => "scheduling",
            RunPhase::FinalVerification => "final_verification",
            RunPhase::Synthesis => "synthesis",
            RunPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts the terminal status is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOutcomeFacts {
    /// Iteration budget ran out before every unit resolved
    pub budget_exhausted: bool,
    pub any_unit_failed: bool,
    /// `Some(false)` when the final verification pass ran and failed
    pub final_verification_passed: Option<bool>,
    pub strict_verification: bool,
    pub coding_goal: bool,
    pub files_written: usize,
    pub dry_run: bool,
}

impl RunOutcomeFacts {
    pub fn from_states(states: &[WorkUnitState]) -> Self {
        Self {
            any_unit_failed: states
                .iter()
                .any(|s| matches!(s.status, UnitStatus::Failed | UnitStatus::Blocked)),
            ..Self::default()
        }
    }
}

/// Derived status plus any note explaining a forced downgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStatus {
    pub status: RunStatus,
    pub note: Option<String>,
}

pub const NO_MUTATION_NOTE: &str =
    "Goal looks like it requires code changes but no files were written";

/// Terminal status, in precedence order: max_iterations, failed,
/// verification_failed, completed.
pub fn derive_run_status(facts: &RunOutcomeFacts) -> DerivedStatus {
    let status = if facts.budget_exhausted {
        RunStatus::MaxIterations
    } else if facts.any_unit_failed {
        RunStatus::Failed
    } else if facts.strict_verification && facts.final_verification_passed == Some(false) {
        RunStatus::VerificationFailed
    } else {
        RunStatus::Completed
    };

    if status == RunStatus::Completed
        && facts.coding_goal
        && facts.files_written == 0
        && !facts.dry_run
    {
        return DerivedStatus {
            status: RunStatus::Failed,
            note: Some(NO_MUTATION_NOTE.to_string()),
        };
    }

    DerivedStatus { status, note: None }
}

static QUESTION_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(explain|describe|summari[sz]e|what|why|how|where|which|who|is|are|does|do|can|could|should|list|show)\b")
        .expect("static pattern")
});

static CODING_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(add|implement|fix|refactor|create|write|update|change|modify|remove|delete|rename|replace|migrate|introduce|build|patch|extend|support|convert|upgrade|bump)\b")
        .expect("static pattern")
});

/// Heuristic: does this goal ask for edits rather than an explanation?
pub fn likely_requires_code_changes(goal: &str) -> bool {
    let goal = goal.trim();
    if goal.is_empty() || QUESTION_LIKE.is_match(goal) {
        return false;
    }
    CODING_VERB.is_match(goal)
}
