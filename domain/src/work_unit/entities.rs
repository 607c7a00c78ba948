//! Work unit entities

use crate::run::failure::UnitFailureCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default scheduling priority (1 is the most urgent).
pub const DEFAULT_PRIORITY: u32 = 3;

/// An immutable node in the run's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique, slug-safe identifier
    pub id: String,
    pub title: String,
    pub objective: String,
    /// Units that must be completed first
    pub depends_on: Vec<String>,
    pub priority: u32,
    pub files_hint: Vec<String>,
    pub verification_focus: Vec<String>,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, objective: impl Into<String>) -> Self {
        let objective = objective.into();
        Self {
            id: id.into(),
            title: objective.clone(),
            objective,
            depends_on: Vec::new(),
            priority: DEFAULT_PRIORITY,
            files_hint: Vec::new(),
            verification_focus: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_file_hint(mut self, path: impl Into<String>) -> Self {
        self.files_hint.push(path.into());
        self
    }
}

/// Execution status of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Blocked,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Running => "running",
            UnitStatus::Completed => "completed",
            UnitStatus::Failed => "failed",
            UnitStatus::Blocked => "blocked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Completed | UnitStatus::Failed | UnitStatus::Blocked
        )
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful attempt hands back to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitCompletion {
    pub summary: String,
    pub critic_score: Option<f64>,
    pub verification_passed: Option<bool>,
    pub files_touched: Vec<String>,
    pub warnings: Vec<String>,
}

/// Mutable execution record for one work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnitState {
    pub unit: WorkUnit,
    pub status: UnitStatus,
    pub attempts: usize,
    pub last_error: Option<String>,
    pub summary: Option<String>,
    pub critic_score: Option<f64>,
    /// `None` means verification never ran for this unit
    pub verification_passed: Option<bool>,
    pub files_touched: Vec<String>,
    pub blocking_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub failure_category: Option<UnitFailureCategory>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkUnitState {
    pub fn new(unit: WorkUnit) -> Self {
        Self {
            unit,
            status: UnitStatus::Pending,
            attempts: 0,
            last_error: None,
            summary: None,
            critic_score: None,
            verification_passed: None,
            files_touched: Vec::new(),
            blocking_issues: Vec::new(),
            warnings: Vec::new(),
            failure_category: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.unit.id
    }

    pub fn mark_running(&mut self) {
        self.status = UnitStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self, completion: UnitCompletion) {
        self.status = UnitStatus::Completed;
        self.summary = Some(completion.summary);
        self.critic_score = completion.critic_score;
        self.verification_passed = completion.verification_passed;
        self.files_touched = completion.files_touched;
        self.warnings.extend(completion.warnings);
        self.last_error = None;
        self.failure_category = None;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, category: UnitFailureCategory) {
        self.status = UnitStatus::Failed;
        self.last_error = Some(error.into());
        self.failure_category = Some(category);
        self.finished_at = Some(Utc::now());
    }

    /// Return a dispatched unit that never got an attempt to pending.
    pub fn mark_not_started(&mut self) {
        self.status = UnitStatus::Pending;
        self.started_at = None;
    }

    pub fn mark_blocked(&mut self, reason: impl Into<String>) {
        self.status = UnitStatus::Blocked;
        self.last_error = Some(reason.into());
        self.failure_category = Some(UnitFailureCategory::Dependency);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::Running.is_terminal());
        assert!(UnitStatus::Completed.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
        assert!(UnitStatus::Blocked.is_terminal());
    }

    #[test]
    fn test_state_transitions() {
        let mut state = WorkUnitState::new(WorkUnit::new("a", "Add endpoint"));
        assert_eq!(state.status, UnitStatus::Pending);

        state.mark_running();
        let started = state.started_at;
        assert!(started.is_some());

        state.mark_failed("Critic rejected", UnitFailureCategory::CriticGate);
        assert_eq!(state.status, UnitStatus::Failed);

        state.mark_running();
        assert_eq!(state.started_at, started, "start time is kept across attempts");

        state.mark_completed(UnitCompletion {
            summary: "done".into(),
            critic_score: Some(0.8),
            verification_passed: Some(true),
            files_touched: vec!["src/health.rs".into()],
            warnings: vec![],
        });
        assert_eq!(state.status, UnitStatus::Completed);
        assert!(state.last_error.is_none());
        assert!(state.failure_category.is_none());
        assert_eq!(state.files_touched, vec!["src/health.rs".to_string()]);
    }

    #[test]
    fn test_not_started_returns_to_pending() {
        let mut state = WorkUnitState::new(WorkUnit::new("c", "Add docs"));
        state.mark_running();
        state.mark_not_started();
        assert_eq!(state.status, UnitStatus::Pending);
        assert!(state.started_at.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_blocked_is_a_dependency_failure() {
        let mut state = WorkUnitState::new(WorkUnit::new("b", "Wire route"));
        state.mark_blocked("Dependency failed");
        assert_eq!(state.status, UnitStatus::Blocked);
        assert_eq!(state.failure_category, Some(UnitFailureCategory::Dependency));
    }
}
