//! Long-term memory port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_domain::ContinuationPacket;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MemoryError {
    #[error("Memory storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryQuery {
    pub query: String,
    /// Restrict to entries about one unit
    pub unit_id: Option<String>,
    pub limit: usize,
}

impl MemoryQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            unit_id: None,
            limit: 8,
        }
    }

    pub fn for_unit(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = Some(unit_id.into());
        self
    }
}

/// Signals about the quality of what was retrieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDiagnostics {
    pub conflict_count: usize,
    /// Retrieved entries disagree enough that mutations need prior evidence
    pub requires_verification_before_mutation: bool,
    pub guidance: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryRetrieval {
    pub context_block: String,
    pub diagnostics: MemoryDiagnostics,
    pub latest_continuation: Option<ContinuationPacket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn retrieve(&self, query: &MemoryQuery) -> Result<MemoryRetrieval, MemoryError>;

    async fn add(&self, entries: Vec<MemoryEntry>) -> Result<(), MemoryError>;

    async fn save_continuation_packet(&self, packet: &ContinuationPacket)
    -> Result<(), MemoryError>;
}

/// Memory store that remembers nothing.
pub struct NoMemory;

#[async_trait]
impl MemoryStore for NoMemory {
    async fn retrieve(&self, _query: &MemoryQuery) -> Result<MemoryRetrieval, MemoryError> {
        Ok(MemoryRetrieval::default())
    }

    async fn add(&self, _entries: Vec<MemoryEntry>) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn save_continuation_packet(
        &self,
        _packet: &ContinuationPacket,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}
