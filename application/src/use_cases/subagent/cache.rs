//! Bounded LRU cache for idempotent subagent roles

use crate::ports::cache_persistence::{CachedSubagentArtifact, SubagentCachePersistence};
use chrono::Utc;
use cohort_domain::{Model, SubagentRole};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 256;

/// Content hash of everything that determines a role's output.
pub fn cache_key(role: SubagentRole, model: &Model, system: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [role.as_str(), model.as_str(), system, prompt] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

struct CacheState {
    entries: HashMap<String, (u64, CachedSubagentArtifact)>,
    tick: u64,
}

/// Recency-ordered cache shared by every unit of a run and persisted across runs.
pub struct SubagentCache {
    state: Mutex<CacheState>,
    max_entries: usize,
    persistence: Arc<dyn SubagentCachePersistence>,
}

impl SubagentCache {
    /// Load persisted entries, keeping the most recently used ones.
    pub fn load(persistence: Arc<dyn SubagentCachePersistence>, max_entries: usize) -> Self {
        let mut loaded = persistence.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load subagent cache; starting empty");
            Vec::new()
        });
        loaded.sort_by_key(|entry| entry.last_used);

        let skip = loaded.len().saturating_sub(max_entries);
        let mut state = CacheState {
            entries: HashMap::new(),
            tick: 0,
        };
        for entry in loaded.into_iter().skip(skip) {
            state.tick += 1;
            state.entries.insert(entry.key.clone(), (state.tick, entry));
        }
        debug!(entries = state.entries.len(), "Loaded subagent cache");

        Self {
            state: Mutex::new(state),
            max_entries: max_entries.max(1),
            persistence,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CacheState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, counting a hit and refreshing its recency.
    pub fn get(&self, key: &str) -> Option<CachedSubagentArtifact> {
        self.with_state(|state| {
            state.tick += 1;
            let tick = state.tick;
            state.entries.get_mut(key).map(|(used, entry)| {
                *used = tick;
                entry.hits += 1;
                entry.last_used = Utc::now();
                entry.clone()
            })
        })
    }

    /// Insert or replace an entry, evicting the least recently used on overflow.
    pub fn put(&self, entry: CachedSubagentArtifact) {
        let max = self.max_entries;
        self.with_state(|state| {
            state.tick += 1;
            state.entries.insert(entry.key.clone(), (state.tick, entry));
            while state.entries.len() > max {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, (used, _))| *used)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        state.entries.remove(&key);
                    }
                    None => break,
                }
            }
        });
    }

    pub fn persist(&self) -> io::Result<()> {
        let mut entries: Vec<(u64, CachedSubagentArtifact)> =
            self.with_state(|s| s.entries.values().cloned().collect());
        entries.sort_by_key(|(used, _)| *used);
        let entries: Vec<CachedSubagentArtifact> = entries.into_iter().map(|(_, e)| e).collect();
        self.persistence.save(&entries)
    }
}
