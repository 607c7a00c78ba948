//! Subagent cache persistence port

use chrono::{DateTime, Utc};
use cohort_domain::SubagentRole;
use serde::{Deserialize, Serialize};
use std::io;

/// A cached role output, reused across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSubagentArtifact {
    pub role: SubagentRole,
    /// SHA-256 of role, model, system prompt and user prompt
    pub key: String,
    pub raw: String,
    pub payload: serde_json::Value,
    pub hits: u64,
    pub last_used: DateTime<Utc>,
}

pub trait SubagentCachePersistence: Send + Sync {
    fn load(&self) -> io::Result<Vec<CachedSubagentArtifact>>;

    fn save(&self, entries: &[CachedSubagentArtifact]) -> io::Result<()>;
}

/// Keeps nothing between runs.
pub struct NoCachePersistence;

impl SubagentCachePersistence for NoCachePersistence {
    fn load(&self) -> io::Result<Vec<CachedSubagentArtifact>> {
        Ok(Vec::new())
    }

    fn save(&self, _entries: &[CachedSubagentArtifact]) -> io::Result<()> {
        Ok(())
    }
}
