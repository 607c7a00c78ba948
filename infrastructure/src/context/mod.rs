//! Prompt context sources: project scan and skill documents.

pub mod intelligence;
pub mod skills;

pub use intelligence::ManifestIntelligence;
pub use skills::MarkdownSkillsLoader;
