//! JSON-file long-term memory.
//!
//! Entries and continuation packets live in `<workspace>/.cohort/memory.json`.
//! Retrieval is keyword overlap against the query; outcome entries that
//! disagree (a similar goal both completed and failed) are reported as
//! conflicts so mutations are preceded by evidence gathering.

use super::json_file::{read_json, write_json};
use async_trait::async_trait;
use cohort_application::ports::memory_store::{
    MemoryDiagnostics, MemoryEntry, MemoryError, MemoryQuery, MemoryRetrieval, MemoryStore,
};
use cohort_domain::{ContinuationPacket, RUN_STATE_DIR, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const MEMORY_FILE: &str = "memory.json";
const MAX_ENTRIES: usize = 500;
const MAX_CONTINUATIONS: usize = 20;
/// Minimum share of query keywords an entry must contain
const MIN_OVERLAP: f64 = 0.3;

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    entries: Vec<MemoryEntry>,
    #[serde(default)]
    continuations: Vec<ContinuationPacket>,
}

pub struct JsonMemoryStore {
    path: PathBuf,
    state: Mutex<MemoryFile>,
}

impl JsonMemoryStore {
    /// Open the store, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match read_json::<MemoryFile>(&path) {
            Ok(file) => file.unwrap_or_default(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Starting with empty memory");
                MemoryFile::default()
            }
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn for_workspace(root: &Path) -> Self {
        Self::open(root.join(RUN_STATE_DIR).join(MEMORY_FILE))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryFile) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn persist(&self, file: &MemoryFile) -> Result<(), MemoryError> {
        write_json(&self.path, file).map_err(|e| MemoryError::Storage(e.to_string()))
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn overlap(query: &HashSet<String>, text: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let words = keywords(text);
    query.intersection(&words).count() as f64 / query.len() as f64
}

fn unit_tag(unit_id: &str) -> String {
    format!("unit:{}", unit_id)
}

/// Entries scoped to another unit are excluded from a unit query.
fn visible_for(entry: &MemoryEntry, unit_id: Option<&str>) -> bool {
    let Some(unit_id) = unit_id else {
        return true;
    };
    let own = unit_tag(unit_id);
    !entry
        .tags
        .iter()
        .any(|t| t.starts_with("unit:") && *t != own)
}

fn diagnose(entries: &[&MemoryEntry]) -> MemoryDiagnostics {
    let has_tag = |e: &&&MemoryEntry, tag: &str| e.tags.iter().any(|t| t == tag);
    let succeeded = entries
        .iter()
        .filter(|e| has_tag(e, RunStatus::Completed.as_str()))
        .count();
    let failed = entries
        .iter()
        .filter(|e| {
            has_tag(e, RunStatus::Failed.as_str())
                || has_tag(e, RunStatus::VerificationFailed.as_str())
        })
        .count();

    let conflict_count = succeeded.min(failed);
    let mut guidance = Vec::new();
    if conflict_count > 0 {
        guidance.push(format!(
            "{} similar past run(s) completed and {} failed; inspect current files before changing them",
            succeeded, failed
        ));
    }
    MemoryDiagnostics {
        conflict_count,
        requires_verification_before_mutation: conflict_count > 0,
        guidance,
    }
}

fn same_goal(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    normalize(a) == normalize(b)
}

#[async_trait]
impl MemoryStore for JsonMemoryStore {
    async fn retrieve(&self, query: &MemoryQuery) -> Result<MemoryRetrieval, MemoryError> {
        let terms = keywords(&query.query);
        let unit_id = query.unit_id.as_deref();

        Ok(self.with_state(|file| {
            let mut scored: Vec<(f64, &MemoryEntry)> = file
                .entries
                .iter()
                .filter(|e| visible_for(e, unit_id))
                .map(|e| (overlap(&terms, &e.content), e))
                .filter(|(score, _)| *score >= MIN_OVERLAP)
                .collect();
            scored.sort_by(|a, b| {
                b.0.total_cmp(&a.0)
                    .then_with(|| b.1.created_at.cmp(&a.1.created_at))
            });
            let hits: Vec<&MemoryEntry> =
                scored.into_iter().take(query.limit).map(|(_, e)| e).collect();

            let context_block = hits
                .iter()
                .map(|e| format!("- [{}] {}", e.kind, e.content.replace('\n', " ")))
                .collect::<Vec<_>>()
                .join("\n");

            let latest_continuation = file
                .continuations
                .iter()
                .rev()
                .find(|p| same_goal(&p.goal, &query.query))
                .cloned();

            MemoryRetrieval {
                context_block,
                diagnostics: diagnose(&hits),
                latest_continuation,
            }
        }))
    }

    async fn add(&self, entries: Vec<MemoryEntry>) -> Result<(), MemoryError> {
        self.with_state(|file| {
            file.entries.extend(entries);
            let excess = file.entries.len().saturating_sub(MAX_ENTRIES);
            file.entries.drain(..excess);
            self.persist(file)
        })
    }

    async fn save_continuation_packet(
        &self,
        packet: &ContinuationPacket,
    ) -> Result<(), MemoryError> {
        self.with_state(|file| {
            // One packet per run; later saves supersede earlier ones
            file.continuations.retain(|p| p.run_id != packet.run_id);
            file.continuations.push(packet.clone());
            let excess = file.continuations.len().saturating_sub(MAX_CONTINUATIONS);
            file.continuations.drain(..excess);
            self.persist(file)
        })
    }
}
