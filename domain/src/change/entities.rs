//! Change domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem operation recorded in the change journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    #[default]
    Write,
    Append,
    Delete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Write => "write",
            ChangeOp::Append => "append",
            ChangeOp::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One literal replacement inside a `patch_file` change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchHunk {
    #[serde(alias = "oldText")]
    pub old_text: String,
    #[serde(alias = "newText")]
    pub new_text: String,
    /// 1-based index of the match to replace when `old_text` occurs more than once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<usize>,
}

impl PatchHunk {
    pub fn new(old_text: impl Into<String>, new_text: impl Into<String>) -> Self {
        Self {
            old_text: old_text.into(),
            new_text: new_text.into(),
            occurrence: None,
        }
    }

    pub fn at_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = Some(occurrence);
        self
    }
}

/// A file change proposed by the coder role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileChange {
    PatchFile {
        path: String,
        hunks: Vec<PatchHunk>,
        #[serde(default)]
        rationale: String,
    },
    WriteFile {
        path: String,
        content: String,
        #[serde(default)]
        rationale: String,
    },
    AppendFile {
        path: String,
        content: String,
        #[serde(default)]
        rationale: String,
    },
    DeleteFile {
        path: String,
        #[serde(default)]
        rationale: String,
    },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            FileChange::PatchFile { path, .. }
            | FileChange::WriteFile { path, .. }
            | FileChange::AppendFile { path, .. }
            | FileChange::DeleteFile { path, .. } => path,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            FileChange::PatchFile { rationale, .. }
            | FileChange::WriteFile { rationale, .. }
            | FileChange::AppendFile { rationale, .. }
            | FileChange::DeleteFile { rationale, .. } => rationale,
        }
    }

    /// Journal operation this change maps to (a patch is journaled as a write).
    pub fn op(&self) -> ChangeOp {
        match self {
            FileChange::PatchFile { .. } | FileChange::WriteFile { .. } => ChangeOp::Write,
            FileChange::AppendFile { .. } => ChangeOp::Append,
            FileChange::DeleteFile { .. } => ChangeOp::Delete,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileChange::PatchFile { .. } => "patch_file",
            FileChange::WriteFile { .. } => "write_file",
            FileChange::AppendFile { .. } => "append_file",
            FileChange::DeleteFile { .. } => "delete_file",
        }
    }
}

/// Append-only record of a mutation (or a dry-run stand-in for one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeJournalEntry {
    pub op: ChangeOp,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
}

/// Pre-image of a path captured before its first mutation in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub existed: bool,
    #[serde(skip_serializing)]
    pub previous_content: Option<String>,
}

/// Result of applying a single change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub summary: String,
    pub output: String,
    pub recorded_action: Option<ChangeJournalEntry>,
}

/// Per-path failure encountered while rolling back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of restoring every snapshot taken during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub restored: Vec<String>,
    pub deleted: Vec<String>,
    pub failures: Vec<RollbackFailure>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn touched(&self) -> usize {
        self.restored.len() + self.deleted.len()
    }
}

/// Excerpt of a workspace file handed to the coder and critic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnippet {
    pub path: String,
    pub content: String,
    /// The file had more lines than were included
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_change_tagged_decoding() {
        let json = serde_json::json!([
            {"kind": "patch_file", "path": "src/lib.rs",
             "hunks": [{"oldText": "a", "newText": "b", "occurrence": 2}]},
            {"kind": "write_file", "path": "README.md", "content": "hi", "rationale": "docs"},
            {"kind": "append_file", "path": "CHANGELOG.md", "content": "- x\n"},
            {"kind": "delete_file", "path": "old.txt"}
        ]);
        let changes: Vec<FileChange> = serde_json::from_value(json).unwrap();

        assert_eq!(changes.len(), 4);
        match &changes[0] {
            FileChange::PatchFile { hunks, .. } => {
                assert_eq!(hunks[0].old_text, "a");
                assert_eq!(hunks[0].occurrence, Some(2));
            }
            other => panic!("unexpected change {:?}", other),
        }
        assert_eq!(changes[1].rationale(), "docs");
        assert_eq!(changes[2].op(), ChangeOp::Append);
        assert_eq!(changes[3].kind(), "delete_file");
        assert_eq!(changes[3].path(), "old.txt");
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = serde_json::json!({"kind": "chmod_file", "path": "x"});
        assert!(serde_json::from_value::<FileChange>(json).is_err());
    }

    #[test]
    fn test_patch_is_journaled_as_write() {
        let change = FileChange::PatchFile {
            path: "a.rs".into(),
            hunks: vec![PatchHunk::new("x", "y")],
            rationale: String::new(),
        };
        assert_eq!(change.op(), ChangeOp::Write);
    }

    #[test]
    fn test_rollback_report_counts() {
        let report = RollbackReport {
            restored: vec!["a".into()],
            deleted: vec!["b".into(), "c".into()],
            failures: vec![],
        };
        assert!(report.is_clean());
        assert_eq!(report.touched(), 3);
    }
}
