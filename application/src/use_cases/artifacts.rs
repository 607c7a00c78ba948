//! Artifact Store
//!
//! Append-only per-unit record of what each role produced, so later roles
//! in the same unit can see it.

use cohort_domain::{ARTIFACT_CONTEXT_WINDOW, ArtifactRecord, render_artifact_context};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct ArtifactStore {
    records: Mutex<BTreeMap<String, Vec<ArtifactRecord>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<R>(&self, f: impl FnOnce(&mut BTreeMap<String, Vec<ArtifactRecord>>) -> R) -> R {
        let mut guard = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn record(&self, record: ArtifactRecord) {
        self.with_records(|records| {
            records
                .entry(record.unit_id.clone())
                .or_default()
                .push(record)
        });
    }

    pub fn for_unit(&self, unit_id: &str) -> Vec<ArtifactRecord> {
        self.with_records(|records| records.get(unit_id).cloned().unwrap_or_default())
    }

    /// The unit's most recent records, rendered for a prompt.
    pub fn render_context(&self, unit_id: &str) -> String {
        self.with_records(|records| {
            records
                .get(unit_id)
                .map(|r| render_artifact_context(r, ARTIFACT_CONTEXT_WINDOW))
                .unwrap_or_default()
        })
    }

    pub fn all(&self) -> BTreeMap<String, Vec<ArtifactRecord>> {
        self.with_records(|records| records.clone())
    }
}
