//! Workspace path safety policy.
//!
//! Every path a change touches is normalized to a workspace-relative form and
//! checked here first. A violation is a policy denial: the caller must not
//! retry it.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Longest accepted relative path.
pub const MAX_PATH_LEN: usize = 260;

/// Internal run-state directory; never writable by a unit.
pub const RUN_STATE_DIR: &str = ".cohort";

static PROTECTED_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(^|/)\.git(/|$)", "git internals"),
        (r"(^|/)\.ssh(/|$)", "ssh configuration"),
        (r"(^|/)\.env($|\.)", "environment file"),
        (r"(^|/)\.cohort(/|$)", "run-state directory"),
        (r"(^|/)id_(rsa|dsa|ecdsa|ed25519)", "private key"),
        (r"\.(pem|key|p12|pfx|keystore)$", "private key material"),
        (r"(^|/)secrets?(/|\.|$)", "secret store"),
        (r"(^|/)\.?(npmrc|pypirc|netrc)$", "credential file"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("static pattern"), label))
    .collect()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathPolicyViolation {
    #[error("path is empty")]
    Empty,

    #[error("absolute paths are not allowed: {0}")]
    Absolute(String),

    #[error("parent traversal is not allowed: {0}")]
    ParentTraversal(String),

    #[error("hidden path segment '{segment}' is not allowed: {path}")]
    HiddenSegment { path: String, segment: String },

    #[error("path contains control characters")]
    ControlCharacter,

    #[error("path is {0} characters, limit is {MAX_PATH_LEN}")]
    TooLong(usize),

    #[error("path is protected ({reason}): {path}")]
    Protected { path: String, reason: String },
}

/// Path policy applied before any read or mutation.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    /// Hidden directories that may still be written (e.g. `.github`)
    pub allowed_hidden_dirs: Vec<String>,
    /// Additional protected path prefixes from configuration
    pub extra_protected_prefixes: Vec<String>,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            allowed_hidden_dirs: vec![".github".to_string()],
            extra_protected_prefixes: Vec::new(),
        }
    }
}

impl PathPolicy {
    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.extra_protected_prefixes.push(prefix.into());
        self
    }

    /// Validate `raw` and return its normalized workspace-relative form.
    pub fn check(&self, raw: &str) -> Result<String, PathPolicyViolation> {
        if raw.chars().any(char::is_control) {
            return Err(PathPolicyViolation::ControlCharacter);
        }

        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Err(PathPolicyViolation::Empty);
        }
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(PathPolicyViolation::Absolute(unified));
        }

        let segments: Vec<&str> = unified
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.is_empty() {
            return Err(PathPolicyViolation::Empty);
        }
        if segments.contains(&"..") {
            return Err(PathPolicyViolation::ParentTraversal(unified));
        }

        let normalized = segments.join("/");
        if normalized.chars().count() > MAX_PATH_LEN {
            return Err(PathPolicyViolation::TooLong(normalized.chars().count()));
        }

        let lowered = normalized.to_lowercase();
        if let Some((_, reason)) = PROTECTED_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(&lowered))
        {
            return Err(PathPolicyViolation::Protected {
                path: normalized,
                reason: reason.to_string(),
            });
        }
        if let Some(prefix) = self
            .extra_protected_prefixes
            .iter()
            .find(|prefix| lowered.starts_with(&prefix.to_lowercase()))
        {
            return Err(PathPolicyViolation::Protected {
                path: normalized.clone(),
                reason: format!("configured prefix {}", prefix),
            });
        }

        if let Some(segment) = segments
            .iter()
            .find(|s| s.starts_with('.') && !self.allowed_hidden_dirs.iter().any(|a| a == *s))
        {
            return Err(PathPolicyViolation::HiddenSegment {
                segment: segment.to_string(),
                path: normalized,
            });
        }

        Ok(normalized)
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
