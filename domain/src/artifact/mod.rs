//! Per-unit artifacts shared between roles.

use crate::core::string::truncate;
use crate::subagent::role::SubagentRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Records rendered into a later role's prompt.
pub const ARTIFACT_CONTEXT_WINDOW: usize = 6;

const MAX_PAYLOAD_CHARS: usize = 1_200;

/// One role's contribution to a unit, kept for the roles that follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub role: SubagentRole,
    pub unit_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub payload: serde_json::Value,
}

impl ArtifactRecord {
    pub fn new(
        role: SubagentRole,
        unit_id: impl Into<String>,
        summary: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            role,
            unit_id: unit_id.into(),
            timestamp: Utc::now(),
            summary: summary.into(),
            payload,
        }
    }
}

/// Render the last `window` records as prompt context.
pub fn render_artifact_context(records: &[ArtifactRecord], window: usize) -> String {
    if records.is_empty() || window == 0 {
        return String::new();
    }
    let start = records.len().saturating_sub(window);
    records[start..]
        .iter()
        .map(|r| {
            format!(
                "[{}] {}\n{}",
                r.role,
                r.summary,
                truncate(&r.payload.to_string(), MAX_PAYLOAD_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
