//! Skills loader port

use serde::{Deserialize, Serialize};

/// A markdown instruction document injected into prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDocument {
    pub id: String,
    pub markdown: String,
}

pub trait SkillsLoader: Send + Sync {
    /// Load the requested skills; unknown ids are skipped.
    fn load(&self, ids: &[String]) -> Vec<SkillDocument>;
}

pub struct NoSkills;

impl SkillsLoader for NoSkills {
    fn load(&self, _ids: &[String]) -> Vec<SkillDocument> {
        Vec::new()
    }
}

/// Concatenate skill documents for a prompt section.
pub fn render_skills(skills: &[SkillDocument]) -> String {
    skills
        .iter()
        .map(|s| format!("### {}\n{}", s.id, s.markdown.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
