//! JSON-file persistence for the subagent cache.

use super::json_file::{read_json, write_json};
use cohort_application::ports::cache_persistence::{
    CachedSubagentArtifact, SubagentCachePersistence,
};
use cohort_domain::RUN_STATE_DIR;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const CACHE_FILE: &str = "subagent-cache.json";
const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CachedSubagentArtifact>,
}

/// Stores cached role outputs in `<workspace>/.cohort/subagent-cache.json`.
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_workspace(root: &Path) -> Self {
        Self::new(root.join(RUN_STATE_DIR).join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SubagentCachePersistence for JsonCacheStore {
    fn load(&self) -> io::Result<Vec<CachedSubagentArtifact>> {
        let Some(file) = read_json::<CacheFile>(&self.path)? else {
            return Ok(Vec::new());
        };
        if file.version != CACHE_VERSION {
            debug!(version = file.version, "Ignoring cache file with unknown version");
            return Ok(Vec::new());
        }
        Ok(file.entries)
    }

    fn save(&self, entries: &[CachedSubagentArtifact]) -> io::Result<()> {
        write_json(
            &self.path,
            &CacheFile {
                version: CACHE_VERSION,
                entries: entries.to_vec(),
            },
        )
    }
}
