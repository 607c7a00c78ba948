//! Continuation packets: a resumable hint for the next run

use crate::core::string::truncate;
use crate::work_unit::entities::{UnitStatus, WorkUnitState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the run mutates the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Live,
    DryRun,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, ExecutionMode::DryRun)
    }
}

/// Snapshot of where a run stands, persisted so a later run can pick up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationPacket {
    pub run_id: String,
    pub execution_mode: ExecutionMode,
    pub goal: String,
    pub summary: String,
    pub pending_work: Vec<String>,
    pub next_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

const MAX_NEXT_ACTIONS: usize = 6;

impl ContinuationPacket {
    pub fn new(
        run_id: impl Into<String>,
        execution_mode: ExecutionMode,
        goal: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            execution_mode,
            goal: goal.into(),
            summary: summary.into(),
            pending_work: Vec::new(),
            next_actions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Build a packet from the current unit states.
    ///
    /// Unfinished units become `pending_work`; failed and blocked units
    /// produce retry suggestions in `next_actions`.
    pub fn from_states(
        run_id: impl Into<String>,
        execution_mode: ExecutionMode,
        goal: impl Into<String>,
        states: &[WorkUnitState],
    ) -> Self {
        let completed = states
            .iter()
            .filter(|s| s.status == UnitStatus::Completed)
            .count();
        let summary = format!("{}/{} work units completed", completed, states.len());

        let pending_work = states
            .iter()
            .filter(|s| !matches!(s.status, UnitStatus::Completed))
            .map(|s| format!("{} [{}]: {}", s.id(), s.status, s.unit.title))
            .collect();

        let next_actions = states
            .iter()
            .filter_map(|s| match s.status {
                UnitStatus::Failed => Some(format!(
                    "Retry {}: {}",
                    s.id(),
                    truncate(s.last_error.as_deref().unwrap_or("unknown error"), 160)
                )),
                UnitStatus::Blocked => Some(format!(
                    "Unblock {}: {}",
                    s.id(),
                    truncate(s.last_error.as_deref().unwrap_or("blocked"), 160)
                )),
                _ => None,
            })
            .take(MAX_NEXT_ACTIONS)
            .collect();

        Self {
            pending_work,
            next_actions,
            ..Self::new(run_id, execution_mode, goal, summary)
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Compact text for inclusion in a later run's prompts.
    pub fn render_hint(&self) -> String {
        let mut out = format!(
            "Previous run {} ({}): {}\nGoal: {}",
            self.run_id,
            match self.execution_mode {
                ExecutionMode::Live => "live",
                ExecutionMode::DryRun => "dry run",
            },
            self.summary,
            self.goal
        );
        if !self.pending_work.is_empty() {
            out.push_str("\nPending:");
            for item in &self.pending_work {
                out.push_str("\n- ");
                out.push_str(item);
            }
        }
        if !self.next_actions.is_empty() {
            out.push_str("\nSuggested next actions:");
            for item in &self.next_actions {
                out.push_str("\n- ");
                out.push_str(item);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::failure::UnitFailureCategory;
    use crate::work_unit::entities::{UnitCompletion, WorkUnit};

    #[test]
    fn test_from_states() {
        let mut done = WorkUnitState::new(WorkUnit::new("a", "first"));
        done.mark_completed(UnitCompletion::default());
        let mut failed = WorkUnitState::new(WorkUnit::new("b", "second"));
        failed.mark_failed("critic rejected", UnitFailureCategory::CriticGate);
        let pending = WorkUnitState::new(WorkUnit::new("c", "third"));

        let packet = ContinuationPacket::from_states(
            "run-1",
            ExecutionMode::Live,
            "goal",
            &[done, failed, pending],
        );

        assert_eq!(packet.summary, "1/3 work units completed");
        assert_eq!(packet.pending_work.len(), 2);
        assert_eq!(packet.next_actions, vec!["Retry b: critic rejected".to_string()]);
        assert!(packet.render_hint().contains("Pending:"));
    }

    #[test]
    fn test_execution_mode_serde() {
        let json = serde_json::to_string(&ExecutionMode::DryRun).unwrap();
        assert_eq!(json, "\"dry_run\"");
        assert!(ExecutionMode::from_dry_run(true).is_dry_run());
    }
}
