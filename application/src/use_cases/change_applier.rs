//! Change Applier
//!
//! Validates target paths, snapshots pre-images and performs write, append,
//! delete and patch operations against the [`FileStore`]. All mutations of a
//! run go through one [`WriteQueue`], so changes from concurrently running
//! units are totally ordered.

use crate::ports::file_store::FileStore;
use chrono::Utc;
use cohort_domain::{
    ChangeJournalEntry, ChangeOutcome, FileChange, FileSnapshot, FileSnippet, MAX_FILE_CHARS,
    PatchError, PathPolicy, PathPolicyViolation, RollbackFailure, RollbackReport, apply_hunks,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("Unsafe path denied by policy: {0}")]
    PolicyDenied(#[from] PathPolicyViolation),

    #[error("File write budget exhausted ({max} writes)")]
    BudgetExhausted { max: usize },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Cannot delete missing file: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl ChangeError {
    /// Refused by policy; retrying the same change cannot succeed.
    pub fn is_policy_denial(&self) -> bool {
        matches!(
            self,
            ChangeError::PolicyDenied(_) | ChangeError::BudgetExhausted { .. }
        )
    }

    fn io(path: &str, err: std::io::Error) -> Self {
        ChangeError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// Applies file changes for one run; owns snapshots and the change journal.
pub struct ChangeApplier {
    store: Arc<dyn FileStore>,
    policy: PathPolicy,
    dry_run: bool,
    max_writes: usize,
    writes: usize,
    snapshots: Vec<FileSnapshot>,
    snapshotted: HashSet<String>,
    journal: Vec<ChangeJournalEntry>,
    /// Dry-run view of file contents; `None` marks a deleted file
    overlay: HashMap<String, Option<String>>,
}

impl ChangeApplier {
    pub fn new(store: Arc<dyn FileStore>, policy: PathPolicy, max_writes: usize) -> Self {
        Self {
            store,
            policy,
            dry_run: false,
            max_writes,
            writes: 0,
            snapshots: Vec::new(),
            snapshotted: HashSet::new(),
            journal: Vec::new(),
            overlay: HashMap::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn writes_used(&self) -> usize {
        self.writes
    }

    pub fn journal(&self) -> &[ChangeJournalEntry] {
        &self.journal
    }

    pub fn snapshots(&self) -> &[FileSnapshot] {
        &self.snapshots
    }

    /// Unique paths actually mutated on disk, in first-touch order.
    pub fn files_written(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.journal
            .iter()
            .filter(|e| !e.dry_run)
            .filter(|e| seen.insert(e.path.clone()))
            .map(|e| e.path.clone())
            .collect()
    }

    /// Apply one change. Nothing is mutated when an error is returned.
    pub fn apply(
        &mut self,
        change: &FileChange,
        unit_id: Option<&str>,
    ) -> Result<ChangeOutcome, ChangeError> {
        let path = self.policy.check(change.path())?;

        let (new_content, details) = match change {
            FileChange::PatchFile { hunks, .. } => {
                let current = self
                    .current_content(&path)?
                    .ok_or_else(|| PatchError::FileMissing { path: path.clone() })?;
                let patched = apply_hunks(&path, &current, hunks)?;
                (Some(patched), format!("patched {} hunk(s)", hunks.len()))
            }
            FileChange::WriteFile { content, .. } => {
                (Some(content.clone()), format!("wrote {} chars", content.chars().count()))
            }
            FileChange::AppendFile { content, .. } => {
                let existing = self.current_content(&path)?.unwrap_or_default();
                let combined = existing + content;
                (Some(combined), format!("appended {} chars", content.chars().count()))
            }
            FileChange::DeleteFile { .. } => {
                if self.current_content(&path)?.is_none() {
                    return Err(ChangeError::NotFound(path));
                }
                (None, "deleted file".to_string())
            }
        };

        if let Some(content) = &new_content {
            let chars = content.chars().count();
            if chars > MAX_FILE_CHARS {
                return Err(PatchError::TooLarge { path, chars }.into());
            }
        }

        if self.writes >= self.max_writes {
            return Err(ChangeError::BudgetExhausted {
                max: self.max_writes,
            });
        }

        if self.dry_run {
            self.overlay.insert(path.clone(), new_content);
        } else {
            self.snapshot(&path)?;
            match change {
                FileChange::AppendFile { content, .. } => self.store.append(&path, content),
                FileChange::DeleteFile { .. } => self.store.delete(&path).map(|_| ()),
                _ => self
                    .store
                    .write(&path, new_content.as_deref().unwrap_or_default()),
            }
            .map_err(|e| ChangeError::io(&path, e))?;
        }

        self.writes += 1;
        let details = if change.rationale().is_empty() {
            details
        } else {
            format!("{} ({})", details, change.rationale())
        };
        let entry = ChangeJournalEntry {
            op: change.op(),
            path: path.clone(),
            timestamp: Utc::now(),
            details: details.clone(),
            dry_run: self.dry_run,
            unit_id: unit_id.map(str::to_string),
        };
        self.journal.push(entry.clone());

        info!(
            path = %path,
            kind = change.kind(),
            dry_run = self.dry_run,
            "Applied change"
        );

        let prefix = if self.dry_run { "[dry run] " } else { "" };
        Ok(ChangeOutcome {
            summary: format!("{}{} {}", prefix, change.kind(), path),
            output: details,
            recorded_action: Some(entry),
        })
    }

    fn current_content(&self, path: &str) -> Result<Option<String>, ChangeError> {
        if self.dry_run
            && let Some(content) = self.overlay.get(path)
        {
            return Ok(content.clone());
        }
        self.store.read(path).map_err(|e| ChangeError::io(path, e))
    }

    /// Capture the pre-image of `path` the first time it is touched.
    fn snapshot(&mut self, path: &str) -> Result<(), ChangeError> {
        if self.snapshotted.contains(path) {
            return Ok(());
        }
        let previous = self.store.read(path).map_err(|e| ChangeError::io(path, e))?;
        debug!(path = %path, existed = previous.is_some(), "Captured snapshot");
        self.snapshots.push(FileSnapshot {
            absolute_path: self.store.absolute(path),
            relative_path: path.to_string(),
            existed: previous.is_some(),
            previous_content: previous,
        });
        self.snapshotted.insert(path.to_string());
        Ok(())
    }

    /// Restore every snapshot, newest first.
    ///
    /// Files that did not exist are deleted; everything else gets its
    /// previous content back. Failures are reported per path.
    pub fn rollback(&mut self) -> RollbackReport {
        let mut report = RollbackReport::default();

        for snapshot in self.snapshots.iter().rev() {
            let path = &snapshot.relative_path;
            let result = match (&snapshot.previous_content, snapshot.existed) {
                (Some(content), true) => self
                    .store
                    .write(path, content)
                    .map(|_| report.restored.push(path.clone())),
                _ => self.store.delete(path).map(|_| report.deleted.push(path.clone())),
            };
            if let Err(e) = result {
                warn!(path = %path, error = %e, "Rollback failed for path");
                report.failures.push(RollbackFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }

        info!(
            restored = report.restored.len(),
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            "Rollback finished"
        );
        self.snapshots.clear();
        self.snapshotted.clear();
        report
    }

    /// Best-effort excerpt of a file under the same path policy.
    ///
    /// Returns `None` for unsafe, missing, unreadable or oversized files.
    pub fn read_snippet(&self, path: &str, max_lines: usize) -> Option<FileSnippet> {
        let path = self.policy.check(path).ok()?;
        if let Ok(Some(size)) = self.store.file_size(&path)
            && size > MAX_FILE_CHARS as u64
        {
            return None;
        }
        let content = self.current_content(&path).ok()??;
        let total = content.lines().count();
        let excerpt = content
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n");
        Some(FileSnippet {
            path,
            content: excerpt,
            truncated: total > max_lines,
        })
    }
}

/// Changes applied for one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedBatch {
    pub outcomes: Vec<ChangeOutcome>,
    pub files_touched: Vec<String>,
}

/// Run-scoped serialized access to the [`ChangeApplier`].
///
/// A unit holds the lock for its whole batch, so batches from different
/// units never interleave.
pub struct WriteQueue {
    applier: Mutex<ChangeApplier>,
}

impl WriteQueue {
    pub fn new(applier: ChangeApplier) -> Self {
        Self {
            applier: Mutex::new(applier),
        }
    }

    /// Apply `changes` in order; the first failure aborts the rest.
    ///
    /// Changes applied before the failure stay applied and journaled; they
    /// are covered by the run's rollback.
    pub async fn apply_batch(
        &self,
        changes: &[FileChange],
        unit_id: &str,
    ) -> Result<AppliedBatch, ChangeError> {
        let mut applier = self.applier.lock().await;
        let mut batch = AppliedBatch::default();
        for change in changes {
            let outcome = applier.apply(change, Some(unit_id))?;
            if let Some(entry) = &outcome.recorded_action
                && !batch.files_touched.contains(&entry.path)
            {
                batch.files_touched.push(entry.path.clone());
            }
            batch.outcomes.push(outcome);
        }
        Ok(batch)
    }

    pub async fn read_snippet(&self, path: &str, max_lines: usize) -> Option<FileSnippet> {
        self.applier.lock().await.read_snippet(path, max_lines)
    }

    pub async fn rollback(&self) -> RollbackReport {
        self.applier.lock().await.rollback()
    }

    pub async fn journal(&self) -> Vec<ChangeJournalEntry> {
        self.applier.lock().await.journal().to_vec()
    }

    pub async fn writes_used(&self) -> usize {
        self.applier.lock().await.writes_used()
    }

    pub async fn files_written(&self) -> Vec<String> {
        self.applier.lock().await.files_written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryFileStore;
    use cohort_domain::PatchHunk;

    fn write(path: &str, content: &str) -> FileChange {
        FileChange::WriteFile {
            path: path.into(),
            content: content.into(),
            rationale: String::new(),
        }
    }

    fn patch(path: &str, old: &str, new: &str) -> FileChange {
        FileChange::PatchFile {
            path: path.into(),
            hunks: vec![PatchHunk::new(old, new)],
            rationale: String::new(),
        }
    }

    fn applier(store: Arc<MemoryFileStore>, max_writes: usize) -> ChangeApplier {
        ChangeApplier::new(store, PathPolicy::default(), max_writes)
    }

    #[test]
    fn test_patch_then_reapply_fails() {
        let store = Arc::new(MemoryFileStore::with_files(&[("src/lib.rs", "let x = 1;")]));
        let mut applier = applier(store.clone(), 10);

        applier.apply(&patch("src/lib.rs", "x = 1", "x = 2"), None).unwrap();
        assert_eq!(store.content("src/lib.rs").as_deref(), Some("let x = 2;"));

        let err = applier
            .apply(&patch("src/lib.rs", "x = 1", "x = 2"), None)
            .unwrap_err();
        assert!(err.to_string().contains("oldText not found"));
        assert_eq!(applier.writes_used(), 1);
    }

    #[test]
    fn test_patch_requires_existing_file() {
        let store = Arc::new(MemoryFileStore::default());
        let mut applier = applier(store, 10);
        let err = applier.apply(&patch("new.rs", "a", "b"), None).unwrap_err();
        assert!(matches!(err, ChangeError::Patch(PatchError::FileMissing { .. })));
    }

    #[test]
    fn test_policy_denial_has_no_side_effects() {
        let store = Arc::new(MemoryFileStore::default());
        let mut applier = applier(store.clone(), 10);
        for path in ["../escape.rs", ".env", ".git/config", "keys/server.pem", ".cohort/state.json"] {
            let err = applier.apply(&write(path, "x"), None).unwrap_err();
            assert!(err.is_policy_denial(), "{path} should be denied");
        }
        assert_eq!(applier.writes_used(), 0);
        assert!(applier.journal().is_empty());
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_write_budget_rejects_before_mutation() {
        let store = Arc::new(MemoryFileStore::default());
        let mut applier = applier(store.clone(), 2);
        applier.apply(&write("a.txt", "1"), None).unwrap();
        applier.apply(&write("b.txt", "2"), None).unwrap();
        let err = applier.apply(&write("c.txt", "3"), None).unwrap_err();
        assert_eq!(err, ChangeError::BudgetExhausted { max: 2 });
        assert!(store.content("c.txt").is_none());
        assert_eq!(applier.writes_used(), 2);
    }

    #[test]
    fn test_rollback_restores_exact_content() {
        let original = "line one\nline two\n";
        let store = Arc::new(MemoryFileStore::with_files(&[("README.md", original)]));
        let mut applier = applier(store.clone(), 10);

        applier.apply(&write("README.md", "changed"), None).unwrap();
        applier.apply(&patch("README.md", "changed", "changed again"), None).unwrap();
        applier.apply(&write("src/new.rs", "fn main() {}"), None).unwrap();

        let report = applier.rollback();
        assert!(report.is_clean());
        assert_eq!(report.restored, vec!["README.md".to_string()]);
        assert_eq!(report.deleted, vec!["src/new.rs".to_string()]);
        assert_eq!(store.content("README.md").as_deref(), Some(original));
        assert!(store.content("src/new.rs").is_none());
    }

    #[test]
    fn test_rollback_reports_failures_per_path() {
        let store = Arc::new(MemoryFileStore::with_files(&[("a.txt", "a")]));
        let mut applier = applier(store.clone(), 10);
        applier.apply(&write("a.txt", "b"), None).unwrap();
        applier.apply(&write("c.txt", "c"), None).unwrap();
        store.fail_writes_to("a.txt");

        let report = applier.rollback();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "a.txt");
        assert_eq!(report.deleted, vec!["c.txt".to_string()]);
    }

    #[test]
    fn test_dry_run_journals_without_touching_disk() {
        let store = Arc::new(MemoryFileStore::with_files(&[("a.txt", "hello")]));
        let mut applier = applier(store.clone(), 10).with_dry_run(true);

        let outcome = applier.apply(&patch("a.txt", "hello", "bye"), Some("u1")).unwrap();
        assert!(outcome.summary.starts_with("[dry run]"));
        // The overlay lets later changes see earlier dry-run edits
        applier.apply(&patch("a.txt", "bye", "ciao"), Some("u1")).unwrap();

        assert_eq!(store.content("a.txt").as_deref(), Some("hello"));
        assert_eq!(applier.writes_used(), 2);
        assert!(applier.journal().iter().all(|e| e.dry_run));
        assert!(applier.files_written().is_empty());
        assert_eq!(applier.rollback().touched(), 0);
    }

    #[test]
    fn test_append_and_delete() {
        let store = Arc::new(MemoryFileStore::with_files(&[("log.txt", "a\n")]));
        let mut applier = applier(store.clone(), 10);
        applier
            .apply(
                &FileChange::AppendFile {
                    path: "log.txt".into(),
                    content: "b\n".into(),
                    rationale: "more".into(),
                },
                None,
            )
            .unwrap();
        assert_eq!(store.content("log.txt").as_deref(), Some("a\nb\n"));

        let delete = FileChange::DeleteFile {
            path: "log.txt".into(),
            rationale: String::new(),
        };
        applier.apply(&delete, None).unwrap();
        assert!(store.content("log.txt").is_none());
        assert_eq!(applier.apply(&delete, None), Err(ChangeError::NotFound("log.txt".into())));
        assert_eq!(applier.journal().len(), 2);
        assert!(applier.journal()[0].details.contains("(more)"));
    }

    #[test]
    fn test_read_snippet() {
        let content = (1..=10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let store = Arc::new(MemoryFileStore::with_files(&[("src/a.rs", content.as_str())]));
        let applier = applier(store, 10);

        let snippet = applier.read_snippet("src/a.rs", 3).unwrap();
        assert_eq!(snippet.content, "line 1\nline 2\nline 3");
        assert!(snippet.truncated);
        assert!(applier.read_snippet("missing.rs", 3).is_none());
        assert!(applier.read_snippet(".env", 3).is_none());
    }

    #[tokio::test]
    async fn test_batch_aborts_on_first_failure() {
        let store = Arc::new(MemoryFileStore::default());
        let queue = WriteQueue::new(applier(store.clone(), 10));
        let changes = vec![
            write("a.txt", "1"),
            patch("missing.txt", "x", "y"),
            write("b.txt", "2"),
        ];
        let err = queue.apply_batch(&changes, "u1").await.unwrap_err();
        assert!(matches!(err, ChangeError::Patch(_)));
        assert!(store.content("a.txt").is_some());
        assert!(store.content("b.txt").is_none());
        assert_eq!(queue.files_written().await, vec!["a.txt".to_string()]);
    }
}
