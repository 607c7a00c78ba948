//! Dependency graph algorithms over work units.

use super::entities::WorkUnit;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Normalize a freshly planned unit set.
///
/// - duplicate ids are suffixed (`-2`, `-3`, ...) so every id is unique
/// - self-references, references to unknown ids and repeated edges are dropped
pub fn normalize_units(units: Vec<WorkUnit>) -> Vec<WorkUnit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut units: Vec<WorkUnit> = units
        .into_iter()
        .map(|mut unit| {
            unit.id = claim_unique_id(&mut seen, std::mem::take(&mut unit.id));
            unit
        })
        .collect();

    for unit in &mut units {
        let own = unit.id.clone();
        unit.depends_on = clean_dependencies(&own, unit.depends_on.drain(..), &seen);
    }
    units
}

/// Reserve `id` in `seen`, suffixing `-2`, `-3`, ... when it is taken.
pub(crate) fn claim_unique_id(seen: &mut HashSet<String>, id: String) -> String {
    let id = if seen.contains(&id) {
        let mut n = 2;
        while seen.contains(&format!("{}-{}", id, n)) {
            n += 1;
        }
        format!("{}-{}", id, n)
    } else {
        id
    };
    seen.insert(id.clone());
    id
}

fn clean_dependencies(
    own_id: &str,
    deps: impl IntoIterator<Item = String>,
    known: &HashSet<String>,
) -> Vec<String> {
    let mut kept = Vec::new();
    for dep in deps {
        if dep != own_id && known.contains(&dep) && !kept.contains(&dep) {
            kept.push(dep);
        }
    }
    kept
}

/// Find one dependency cycle, if any.
///
/// Uses DFS with an explicit recursion stack; the returned path starts and
/// ends with the same id (e.g. `["a", "b", "a"]`).
pub fn find_cycle(units: &[WorkUnit]) -> Option<Vec<String>> {
    let edges: HashMap<&str, &[String]> = units
        .iter()
        .map(|u| (u.id.as_str(), u.depends_on.as_slice()))
        .collect();

    let mut finished: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();

    for unit in units {
        if let Some(cycle) = visit(unit.id.as_str(), &edges, &mut finished, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    id: &'a str,
    edges: &HashMap<&'a str, &'a [String]>,
    finished: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    if finished.contains(id) {
        return None;
    }
    if let Some(pos) = stack.iter().position(|s| *s == id) {
        let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
        cycle.push(id.to_string());
        return Some(cycle);
    }

    stack.push(id);
    for dep in edges.get(id).copied().unwrap_or_default() {
        if !edges.contains_key(dep.as_str()) {
            continue;
        }
        if let Some(cycle) = visit(dep.as_str(), edges, finished, stack) {
            return Some(cycle);
        }
    }
    stack.pop();
    finished.insert(id);
    None
}

/// Ids of every unit that lies on at least one cycle.
pub fn units_on_cycles(units: &[WorkUnit]) -> BTreeSet<String> {
    let edges: HashMap<&str, &[String]> = units
        .iter()
        .map(|u| (u.id.as_str(), u.depends_on.as_slice()))
        .collect();

    units
        .iter()
        .filter(|unit| reaches(&edges, unit.id.as_str(), unit.id.as_str()))
        .map(|unit| unit.id.clone())
        .collect()
}

fn reaches(edges: &HashMap<&str, &[String]>, from: &str, target: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut frontier: Vec<&str> = edges
        .get(from)
        .map(|deps| deps.iter().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(next) = frontier.pop() {
        if next == target {
            return true;
        }
        if !visited.insert(next) {
            continue;
        }
        if let Some(deps) = edges.get(next) {
            frontier.extend(deps.iter().map(String::as_str));
        }
    }
    false
}

/// Current `depends_on` mapping, keyed by unit id.
pub fn dependency_map(units: &[WorkUnit]) -> BTreeMap<String, Vec<String>> {
    units
        .iter()
        .map(|u| (u.id.clone(), u.depends_on.clone()))
        .collect()
}

/// Why a proposed dependency revision was not applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionRejected {
    #[error("revision does not change any dependency edge")]
    NoChange,

    #[error("revision reintroduces a cycle: {}", .0.join(" -> "))]
    IntroducesCycle(Vec<String>),
}

/// Apply a proposed `depends_on` mapping.
///
/// Only units named in `revision` change; their new edges are cleaned the same
/// way [`normalize_units`] cleans them. The revision is rejected when it
/// changes nothing or when the resulting graph has a cycle.
pub fn revise_dependencies(
    units: &[WorkUnit],
    revision: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<WorkUnit>, RevisionRejected> {
    let known: HashSet<String> = units.iter().map(|u| u.id.clone()).collect();

    let mut changed = false;
    let revised: Vec<WorkUnit> = units
        .iter()
        .map(|unit| {
            let mut unit = unit.clone();
            if let Some(deps) = revision.get(&unit.id) {
                let cleaned = clean_dependencies(&unit.id, deps.iter().cloned(), &known);
                let before: BTreeSet<&String> = unit.depends_on.iter().collect();
                let after: BTreeSet<&String> = cleaned.iter().collect();
                if before != after {
                    changed = true;
                }
                unit.depends_on = cleaned;
            }
            unit
        })
        .collect();

    if !changed {
        return Err(RevisionRejected::NoChange);
    }
    if let Some(cycle) = find_cycle(&revised) {
        return Err(RevisionRejected::IntroducesCycle(cycle));
    }
    Ok(revised)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, deps: &[&str]) -> WorkUnit {
        let mut u = WorkUnit::new(id, format!("objective {}", id));
        u.depends_on = deps.iter().map(|d| d.to_string()).collect();
        u
    }

    #[test]
    fn test_dangling_reference_is_stripped() {
        let units = normalize_units(vec![unit("a", &["ghost"])]);
        assert!(units[0].depends_on.is_empty());
    }

    #[test]
    fn test_self_reference_and_duplicates_are_stripped() {
        let units = normalize_units(vec![unit("a", &[]), unit("b", &["b", "a", "a"])]);
        assert_eq!(units[1].depends_on, vec!["a".to_string()]);
    }

    #[test]
    fn test_duplicate_ids_are_suffixed() {
        let units = normalize_units(vec![unit("api", &[]), unit("api", &[]), unit("api", &[])]);
        let ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["api", "api-2", "api-3"]);
    }

    #[test]
    fn test_find_cycle_none_for_dag() {
        let units = vec![unit("a", &[]), unit("b", &["a"]), unit("c", &["a", "b"])];
        assert!(find_cycle(&units).is_none());
        assert!(units_on_cycles(&units).is_empty());
    }

    #[test]
    fn test_find_mutual_cycle() {
        let units = vec![unit("a", &["b"]), unit("b", &["a"])];
        let cycle = find_cycle(&units).unwrap();
        assert_eq!(cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_units_on_cycles_excludes_tail() {
        // c depends on the cycle but is not part of it
        let units = vec![unit("a", &["b"]), unit("b", &["a"]), unit("c", &["a"])];
        let members = units_on_cycles(&units);
        assert_eq!(members.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_revision_breaks_cycle() {
        let units = vec![unit("a", &["b"]), unit("b", &["a"])];
        let mut revision = BTreeMap::new();
        revision.insert("a".to_string(), vec![]);
        let revised = revise_dependencies(&units, &revision).unwrap();
        assert!(revised[0].depends_on.is_empty());
        assert_eq!(revised[1].depends_on, vec!["a".to_string()]);
    }

    #[test]
    fn test_revision_without_change_is_rejected() {
        let units = vec![unit("a", &["b"]), unit("b", &["a"])];
        let mut revision = BTreeMap::new();
        revision.insert("a".to_string(), vec!["b".to_string()]);
        revision.insert("ghost".to_string(), vec![]);
        assert_eq!(
            revise_dependencies(&units, &revision),
            Err(RevisionRejected::NoChange)
        );
    }

    #[test]
    fn test_revision_introducing_cycle_is_rejected() {
        let units = vec![unit("a", &[]), unit("b", &["a"])];
        let mut revision = BTreeMap::new();
        revision.insert("a".to_string(), vec!["b".to_string()]);
        assert!(matches!(
            revise_dependencies(&units, &revision),
            Err(RevisionRejected::IntroducesCycle(_))
        ));
    }
}
