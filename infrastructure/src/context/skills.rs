//! Markdown skills loader.
//!
//! A skill is a markdown file named `<id>.md`. Search order:
//!
//! 1. `<workspace>/.cohort/skills/`
//! 2. `~/.config/cohort/skills/`
//!
//! The first match wins; ids that match nothing are skipped with a warning.

use cohort_application::ports::skills_loader::{SkillDocument, SkillsLoader};
use cohort_domain::RUN_STATE_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct MarkdownSkillsLoader {
    search_dirs: Vec<PathBuf>,
}

impl MarkdownSkillsLoader {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn for_workspace(root: &Path) -> Self {
        let mut dirs = vec![root.join(RUN_STATE_DIR).join("skills")];
        if let Some(config) = dirs::config_dir() {
            dirs.push(config.join("cohort").join("skills"));
        }
        Self::new(dirs)
    }

    fn valid_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn find(&self, id: &str) -> Option<String> {
        self.search_dirs.iter().find_map(|dir| {
            let path = dir.join(format!("{}.md", id));
            match fs::read_to_string(&path) {
                Ok(markdown) if !markdown.trim().is_empty() => {
                    debug!(skill = id, path = %path.display(), "Loaded skill");
                    Some(markdown)
                }
                _ => None,
            }
        })
    }
}

impl SkillsLoader for MarkdownSkillsLoader {
    fn load(&self, ids: &[String]) -> Vec<SkillDocument> {
        ids.iter()
            .filter_map(|id| {
                if !Self::valid_id(id) {
                    warn!(skill = %id, "Ignoring skill with invalid id");
                    return None;
                }
                match self.find(id) {
                    Some(markdown) => Some(SkillDocument {
                        id: id.clone(),
                        markdown,
                    }),
                    None => {
                        warn!(skill = %id, "Skill not found");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_directory_wins() {
        let project = tempfile::tempdir().unwrap();
        let global = tempfile::tempdir().unwrap();
        fs::write(project.path().join("rust.md"), "project rules").unwrap();
        fs::write(global.path().join("rust.md"), "global rules").unwrap();
        fs::write(global.path().join("tests.md"), "write tests").unwrap();

        let loader = MarkdownSkillsLoader::new(vec![
            project.path().to_path_buf(),
            global.path().to_path_buf(),
        ]);
        let skills = loader.load(&["rust".into(), "tests".into(), "missing".into()]);

        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].markdown, "project rules");
        assert_eq!(skills[1].id, "tests");
    }

    #[test]
    fn test_path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("secret.md"), "x").unwrap();
        let loader = MarkdownSkillsLoader::new(vec![dir.path().join("skills")]);
        assert!(loader.load(&["../secret".into()]).is_empty());
    }
}
