//! Turn a supervisor plan into normalized work units

use super::entities::{DEFAULT_PRIORITY, WorkUnit};
use super::graph::{claim_unique_id, normalize_units};
use crate::core::error::DomainError;
use crate::core::string::slugify;
use crate::subagent::outputs::SupervisorPlanOutput;
use std::collections::{HashMap, HashSet};

/// Upper bound on units accepted from a single plan.
pub const MAX_WORK_UNITS: usize = 12;

/// Build the run's work units from a decoded supervisor plan.
///
/// Ids are slugified (falling back to the title, then `unit-N`) and made
/// unique, dependency references are rewritten to the final ids, and the
/// result is normalized so that no unit depends on itself or on an unknown id.
pub fn build_work_units(plan: &SupervisorPlanOutput) -> Result<Vec<WorkUnit>, DomainError> {
    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut units = Vec::new();

    for (index, planned) in plan.work_units.iter().enumerate() {
        if units.len() >= MAX_WORK_UNITS {
            break;
        }

        let objective = if planned.objective.trim().is_empty() {
            planned.title.trim().to_string()
        } else {
            planned.objective.trim().to_string()
        };
        if objective.is_empty() {
            continue;
        }
        let title = if planned.title.trim().is_empty() {
            objective.clone()
        } else {
            planned.title.trim().to_string()
        };

        let raw_id = planned.id.clone().unwrap_or_default();
        let mut id = slugify(&raw_id);
        if id.is_empty() {
            id = slugify(&title);
        }
        if id.is_empty() {
            id = format!("unit-{}", index + 1);
        }
        let id = claim_unique_id(&mut taken, id);
        if !raw_id.is_empty() {
            renamed.entry(raw_id).or_insert_with(|| id.clone());
        }

        let mut unit = WorkUnit::new(id, objective)
            .with_title(title)
            .with_priority(planned.priority.unwrap_or(DEFAULT_PRIORITY).max(1));
        unit.depends_on = planned.depends_on.clone();
        unit.files_hint = planned.files_hint.clone();
        unit.verification_focus = planned.verification_focus.clone();
        units.push(unit);
    }

    if units.is_empty() {
        return Err(DomainError::InvalidPlan(
            "plan contains no usable work units".to_string(),
        ));
    }

    for unit in &mut units {
        unit.depends_on = unit
            .depends_on
            .iter()
            .map(|dep| {
                renamed
                    .get(dep)
                    .cloned()
                    .unwrap_or_else(|| slugify(dep))
            })
            .collect();
    }

    Ok(normalize_units(units))
}

/// Single unit covering the whole goal, used when planning fails.
pub fn fallback_unit(goal: &str) -> WorkUnit {
    WorkUnit::new("complete-goal", goal.trim()).with_title("Complete the requested goal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subagent::outputs::PlannedUnit;

    fn planned(id: Option<&str>, title: &str, deps: &[&str]) -> PlannedUnit {
        PlannedUnit {
            id: id.map(str::to_string),
            title: title.to_string(),
            objective: format!("do {}", title),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn plan(units: Vec<PlannedUnit>) -> SupervisorPlanOutput {
        SupervisorPlanOutput {
            summary: String::new(),
            strategy: String::new(),
            work_units: units,
        }
    }

    #[test]
    fn test_ids_are_slugified_and_dependencies_rewritten() {
        let units = build_work_units(&plan(vec![
            planned(Some("Add Model"), "model", &[]),
            planned(Some("Wire Route"), "route", &["Add Model"]),
        ]))
        .unwrap();

        assert_eq!(units[0].id, "add-model");
        assert_eq!(units[1].id, "wire-route");
        assert_eq!(units[1].depends_on, vec!["add-model".to_string()]);
    }

    #[test]
    fn test_colliding_slugs_keep_dependencies_on_the_right_unit() {
        let units = build_work_units(&plan(vec![
            planned(Some("Add Model"), "model", &[]),
            planned(Some("add model"), "model tests", &[]),
            planned(Some("Wire Route"), "route", &["add model"]),
        ]))
        .unwrap();

        assert_eq!(units[0].id, "add-model");
        assert_eq!(units[1].id, "add-model-2");
        assert_eq!(units[2].depends_on, vec!["add-model-2".to_string()]);
    }

    #[test]
    fn test_missing_id_falls_back_to_title() {
        let units = build_work_units(&plan(vec![planned(None, "Update docs", &[])])).unwrap();
        assert_eq!(units[0].id, "update-docs");
    }

    #[test]
    fn test_unknown_dependency_dropped() {
        let units = build_work_units(&plan(vec![planned(Some("a"), "a", &["zzz"])])).unwrap();
        assert!(units[0].depends_on.is_empty());
    }

    #[test]
    fn test_empty_plan_is_invalid() {
        let mut empty = planned(None, "", &[]);
        empty.objective = String::new();
        assert!(matches!(
            build_work_units(&plan(vec![empty])),
            Err(DomainError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_plan_is_capped() {
        let many = (0..20)
            .map(|i| planned(Some(&format!("u{}", i)), &format!("task {}", i), &[]))
            .collect();
        assert_eq!(build_work_units(&plan(many)).unwrap().len(), MAX_WORK_UNITS);
    }

    #[test]
    fn test_fallback_unit_covers_goal() {
        let unit = fallback_unit("  add a health endpoint ");
        assert_eq!(unit.objective, "add a health endpoint");
        assert!(unit.depends_on.is_empty());
    }
}
