//! File store port
//!
//! Workspace-relative file access. Paths handed to this port have already
//! passed the path policy; the store only resolves them against its root.

use std::io;
use std::path::{Path, PathBuf};

pub trait FileStore: Send + Sync {
    /// Resolved workspace root.
    fn root(&self) -> &Path;

    fn absolute(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// File content, or `None` if the file does not exist.
    fn read(&self, relative: &str) -> io::Result<Option<String>>;

    /// Create or replace a file, creating parent directories.
    fn write(&self, relative: &str, content: &str) -> io::Result<()>;

    fn append(&self, relative: &str, content: &str) -> io::Result<()>;

    /// Returns whether a file was removed.
    fn delete(&self, relative: &str) -> io::Result<bool>;

    fn exists(&self, relative: &str) -> bool;

    fn file_size(&self, relative: &str) -> io::Result<Option<u64>>;

    /// Indented listing of the workspace, at most `max_entries` lines.
    fn tree_preview(&self, max_entries: usize) -> String;
}
