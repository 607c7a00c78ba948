//! Local filesystem implementation of [`FileStore`].

use super::walk::walk_pruned;
use cohort_application::ports::file_store::FileStore;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories the tree preview never descends into.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".cohort",
    "target",
    "node_modules",
    "dist",
    "build",
    ".venv",
    "__pycache__",
];

/// Workspace rooted at a resolved directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Resolve `root` to an absolute, canonical directory.
    pub fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("'{}' is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }
}

impl FileStore for LocalFileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, relative: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.absolute(relative)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, relative: &str, content: &str) -> io::Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(())
    }

    fn append(&self, relative: &str, content: &str) -> io::Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(content.as_bytes())
    }

    fn delete(&self, relative: &str) -> io::Result<bool> {
        match fs::remove_file(self.absolute(relative)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, relative: &str) -> bool {
        self.absolute(relative).is_file()
    }

    fn file_size(&self, relative: &str) -> io::Result<Option<u64>> {
        match fs::metadata(self.absolute(relative)) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn tree_preview(&self, max_entries: usize) -> String {
        let mut entries = match walk_pruned(&self.root, IGNORED_DIRS) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to list workspace");
                return String::new();
            }
        };
        entries.sort();

        let total = entries.len();
        let mut lines: Vec<String> = entries
            .iter()
            .take(max_entries)
            .map(|entry| {
                let depth = entry.relative.components().count().saturating_sub(1);
                let name = entry
                    .relative
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let suffix = if entry.is_dir { "/" } else { "" };
                format!("{}{}{}", "  ".repeat(depth), name, suffix)
            })
            .collect();
        if total > max_entries {
            lines.push(format!("... ({} more entries)", total - max_entries));
        }
        lines.join("\n")
    }
}
