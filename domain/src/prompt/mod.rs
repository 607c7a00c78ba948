//! Prompt domain
//!
//! Templates for every subagent role in the run.

pub mod roles;

pub use roles::{RolePromptTemplate, UnitPromptContext};
