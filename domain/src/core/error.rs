//! Domain error types

use crate::change::patch::PatchError;
use crate::change::path_policy::PathPolicyViolation;
use crate::subagent::parsing::ParseError;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown work unit: {0}")]
    UnknownUnit(String),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Unsafe path: {0}")]
    PathPolicy(#[from] PathPolicyViolation),

    #[error("Unparseable output: {0}")]
    Parse(#[from] ParseError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
