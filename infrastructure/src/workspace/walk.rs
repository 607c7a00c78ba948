//! Recursive workspace walk that never descends into skipped directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One entry found by [`walk_pruned`], relative to the walk root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WalkEntry {
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// List everything under `root`, pruning directories named in `skip`.
///
/// Unreadable subdirectories are logged and left out. Symlinked
/// directories are listed but not followed.
pub fn walk_pruned(root: &Path, skip: &[&str]) -> io::Result<Vec<WalkEntry>> {
    let mut entries = Vec::new();
    walk_dir(root, Path::new(""), skip, &mut entries)?;
    Ok(entries)
}

fn walk_dir(
    dir: &Path,
    prefix: &Path,
    skip: &[&str],
    entries: &mut Vec<WalkEntry>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_dir = entry.file_type()?.is_dir();
        if is_dir && name.to_str().is_some_and(|name| skip.contains(&name)) {
            continue;
        }

        let relative = prefix.join(&name);
        entries.push(WalkEntry {
            relative: relative.clone(),
            is_dir,
        });
        if is_dir && let Err(e) = walk_dir(&entry.path(), &relative, skip, entries) {
            debug!(path = %relative.display(), error = %e, "Skipping unreadable directory");
        }
    }
    Ok(())
}
