//! Scheduler-owned view over every unit's execution state

use super::entities::{UnitStatus, WorkUnit, WorkUnitState};
use std::collections::HashMap;

/// Work unit states kept in plan order.
#[derive(Debug, Clone, Default)]
pub struct UnitBoard {
    order: Vec<String>,
    states: HashMap<String, WorkUnitState>,
}

impl UnitBoard {
    pub fn new(units: Vec<WorkUnit>) -> Self {
        let order = units.iter().map(|u| u.id.clone()).collect();
        let states = units
            .into_iter()
            .map(|u| (u.id.clone(), WorkUnitState::new(u)))
            .collect();
        Self { order, states }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&WorkUnitState> {
        self.states.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut WorkUnitState> {
        self.states.get_mut(id)
    }

    /// States in plan order.
    pub fn states(&self) -> impl Iterator<Item = &WorkUnitState> {
        self.order.iter().filter_map(|id| self.states.get(id))
    }

    pub fn units(&self) -> Vec<WorkUnit> {
        self.states().map(|s| s.unit.clone()).collect()
    }

    pub fn count(&self, status: UnitStatus) -> usize {
        self.states().filter(|s| s.status == status).count()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.states()
            .filter(|s| s.status == UnitStatus::Pending)
            .map(|s| s.id().to_string())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.states().any(|s| s.status == UnitStatus::Pending)
    }

    pub fn all_resolved(&self) -> bool {
        self.states().all(|s| s.status.is_terminal())
    }

    fn status_of(&self, id: &str) -> Option<UnitStatus> {
        self.states.get(id).map(|s| s.status)
    }

    /// Block pending units whose dependencies failed or were blocked.
    ///
    /// Repeats until nothing changes so transitive dependents are caught in
    /// the same round. Returns the newly blocked ids.
    pub fn block_dependents_of_failed(&mut self) -> Vec<String> {
        let mut newly_blocked = Vec::new();
        loop {
            let mut round: Vec<(String, String)> = Vec::new();
            for state in self.states() {
                if state.status != UnitStatus::Pending {
                    continue;
                }
                let broken = state.unit.depends_on.iter().find(|dep| {
                    matches!(
                        self.status_of(dep),
                        Some(UnitStatus::Failed | UnitStatus::Blocked)
                    )
                });
                if let Some(dep) = broken {
                    round.push((state.id().to_string(), dep.clone()));
                }
            }
            if round.is_empty() {
                return newly_blocked;
            }
            for (id, dep) in round {
                if let Some(state) = self.states.get_mut(&id) {
                    state.mark_blocked(format!("Dependency failed: {}", dep));
                }
                newly_blocked.push(id);
            }
        }
    }

    /// Pending units whose dependencies are all completed, most urgent first.
    ///
    /// Lower `priority` values run first; ties keep plan order.
    pub fn ready(&self) -> Vec<WorkUnit> {
        let mut ready: Vec<(usize, &WorkUnitState)> = self
            .states()
            .enumerate()
            .filter(|(_, s)| s.status == UnitStatus::Pending)
            .filter(|(_, s)| {
                s.unit
                    .depends_on
                    .iter()
                    .all(|dep| self.status_of(dep) == Some(UnitStatus::Completed))
            })
            .collect();
        ready.sort_by_key(|(index, s)| (s.unit.priority, *index));
        ready.into_iter().map(|(_, s)| s.unit.clone()).collect()
    }

    /// Swap in revised dependency edges, keeping every execution record.
    pub fn replace_dependencies(&mut self, units: &[WorkUnit]) {
        for unit in units {
            if let Some(state) = self.states.get_mut(&unit.id) {
                state.unit.depends_on = unit.depends_on.clone();
            }
        }
    }

    /// Block every pending unit with a reason chosen per id.
    pub fn block_pending(&mut self, reason_for: impl Fn(&str) -> String) -> Vec<String> {
        let pending = self.pending_ids();
        for id in &pending {
            if let Some(state) = self.states.get_mut(id) {
                state.mark_blocked(reason_for(id));
            }
        }
        pending
    }

    pub fn into_states(mut self) -> Vec<WorkUnitState> {
        self.order
            .iter()
            .filter_map(|id| self.states.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::failure::UnitFailureCategory;
    use crate::work_unit::entities::UnitCompletion;

    fn board() -> UnitBoard {
        UnitBoard::new(vec![
            WorkUnit::new("a", "first"),
            WorkUnit::new("b", "second").with_dependency("a"),
            WorkUnit::new("c", "third").with_dependency("b"),
            WorkUnit::new("d", "fourth").with_priority(1),
        ])
    }

    fn ids(units: &[WorkUnit]) -> Vec<&str> {
        units.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_ready_respects_dependencies_and_priority() {
        let board = board();
        assert_eq!(ids(&board.ready()), vec!["d", "a"]);
    }

    #[test]
    fn test_completion_releases_dependents() {
        let mut board = board();
        board
            .get_mut("a")
            .unwrap()
            .mark_completed(UnitCompletion::default());
        assert_eq!(ids(&board.ready()), vec!["d", "b"]);
    }

    #[test]
    fn test_failure_blocks_transitively() {
        let mut board = board();
        board
            .get_mut("a")
            .unwrap()
            .mark_failed("boom", UnitFailureCategory::Unknown);

        let blocked = board.block_dependents_of_failed();
        assert_eq!(blocked, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(board.get("c").unwrap().status, UnitStatus::Blocked);
        assert_eq!(
            board.get("b").unwrap().last_error.as_deref(),
            Some("Dependency failed: a")
        );
        assert_eq!(ids(&board.ready()), vec!["d"]);
    }

    #[test]
    fn test_all_resolved() {
        let mut board = UnitBoard::new(vec![WorkUnit::new("a", "x")]);
        assert!(!board.all_resolved());
        board
            .get_mut("a")
            .unwrap()
            .mark_completed(UnitCompletion::default());
        assert!(board.all_resolved());
        assert!(!board.has_pending());
    }

    #[test]
    fn test_block_pending_uses_reason() {
        let mut board = board();
        let blocked = board.block_pending(|id| format!("stuck {}", id));
        assert_eq!(blocked.len(), 4);
        assert_eq!(
            board.get("d").unwrap().last_error.as_deref(),
            Some("stuck d")
        );
        assert_eq!(board.into_states().len(), 4);
    }
}
