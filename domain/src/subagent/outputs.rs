//! Typed schemas for each role's JSON output.
//!
//! Decoding is strict about the fields a role cannot do without (`changes`
//! and `confidence` for the coder, `score` for the critic, `work_units` for
//! the supervisor plan) and forgiving about everything else: optional lists
//! default to empty and a lone string is accepted where a list is expected.

use crate::change::entities::{ChangeOp, FileChange};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A decoded role output with semantic validation beyond the schema.
pub trait SubagentOutput: DeserializeOwned + Serialize + Send {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be within [0, 1], got {}", name, value))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
    Nothing(()),
}

/// Accept `"a"`, `["a", "b"]` or `null` for a string list.
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}

/// Accept ids given as strings or bare numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Accept dependency ids given as strings or bare numbers.
fn lenient_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let items = match value {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items,
        Some(single) => vec![single],
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(de::Error::custom(format!("invalid dependency id: {}", other))),
        })
        .collect()
}

// ==================== Supervisor ====================

/// Supervisor decomposition of the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorPlanOutput {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(alias = "workUnits", alias = "units")]
    pub work_units: Vec<PlannedUnit>,
}

impl SubagentOutput for SupervisorPlanOutput {
    fn validate(&self) -> Result<(), String> {
        if self.work_units.is_empty() {
            return Err("work_units must not be empty".to_string());
        }
        Ok(())
    }
}

/// One work unit as proposed by the supervisor, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannedUnit {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub objective: String,
    #[serde(
        default,
        alias = "dependsOn",
        alias = "dependencies",
        deserialize_with = "lenient_id_list"
    )]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(
        default,
        alias = "filesHint",
        alias = "files",
        deserialize_with = "lenient_string_list"
    )]
    pub files_hint: Vec<String>,
    #[serde(
        default,
        alias = "verificationFocus",
        deserialize_with = "lenient_string_list"
    )]
    pub verification_focus: Vec<String>,
}

/// Supervisor answer to a deadlocked or cyclic graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplanOutput {
    #[serde(alias = "dependencies", alias = "dependsOn")]
    pub depends_on: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rationale: String,
}

impl SubagentOutput for ReplanOutput {}

// ==================== Scout ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantFile {
    pub path: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_relevance")]
    pub relevance: f64,
}

fn default_relevance() -> f64 {
    0.5
}

/// Read-only reconnaissance of the workspace for one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutOutput {
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "relevantFiles")]
    pub relevant_files: Vec<RelevantFile>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub risks: Vec<String>,
}

impl SubagentOutput for ScoutOutput {
    fn validate(&self) -> Result<(), String> {
        for file in &self.relevant_files {
            check_unit_interval("relevance", file.relevance)?;
        }
        Ok(())
    }
}

// ==================== Planner ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteTarget {
    pub path: String,
    #[serde(default)]
    pub operation: ChangeOp,
    #[serde(default)]
    pub rationale: String,
}

/// Implementation plan for one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutput {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub approach: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub steps: Vec<String>,
    #[serde(default, alias = "writeTargets")]
    pub write_targets: Vec<WriteTarget>,
    #[serde(default, alias = "testFocus", deserialize_with = "lenient_string_list")]
    pub test_focus: Vec<String>,
}

impl SubagentOutput for PlannerOutput {}

// ==================== Coder ====================

/// Concrete file changes for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoderOutput {
    #[serde(default)]
    pub summary: String,
    pub changes: Vec<FileChange>,
    #[serde(
        default,
        alias = "verificationNotes",
        deserialize_with = "lenient_string_list"
    )]
    pub verification_notes: Vec<String>,
    #[serde(
        default,
        alias = "remainingRisks",
        deserialize_with = "lenient_string_list"
    )]
    pub remaining_risks: Vec<String>,
    pub confidence: f64,
}

impl SubagentOutput for CoderOutput {
    fn validate(&self) -> Result<(), String> {
        check_unit_interval("confidence", self.confidence)
    }
}

// ==================== Critic ====================

/// Review of the coder's proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticOutput {
    #[serde(default)]
    pub summary: String,
    pub score: f64,
    #[serde(
        default,
        alias = "blockingIssues",
        deserialize_with = "lenient_string_list"
    )]
    pub blocking_issues: Vec<String>,
    #[serde(
        default,
        alias = "nonBlockingIssues",
        deserialize_with = "lenient_string_list"
    )]
    pub non_blocking_issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub recommendations: Vec<String>,
}

impl SubagentOutput for CriticOutput {
    fn validate(&self) -> Result<(), String> {
        check_unit_interval("score", self.score)
    }
}

// ==================== Synthesizer ====================

/// Run-level summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub highlights: Vec<String>,
    #[serde(default, alias = "followUps", deserialize_with = "lenient_string_list")]
    pub follow_ups: Vec<String>,
}

impl SubagentOutput for SynthesisOutput {
    fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("summary must not be empty".to_string());
        }
        Ok(())
    }
}
