//! Run parameters: budgets, pipeline tuning, verification and safety.
//!
//! Built by the infrastructure config loader from `[budgets]`, `[pipeline]`,
//! `[verification]` and `[safety]` sections, then adjusted by CLI flags.

use crate::use_cases::subagent::cache::DEFAULT_MAX_CACHE_ENTRIES;
use cohort_domain::review::gate::DEFAULT_CRITIC_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard limits for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Unit attempts the scheduler may start in total
    pub max_iterations: usize,
    pub max_parallel_work_units: usize,
    pub max_file_writes: usize,
    pub max_command_runs: usize,
    /// Dependency replans shared between initial cycle repair and deadlocks
    pub max_replans: usize,
    pub command_timeout: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iterations: 24,
            max_parallel_work_units: 3,
            max_file_writes: 40,
            max_command_runs: 30,
            max_replans: 3,
            command_timeout: Duration::from_secs(120),
        }
    }
}

/// Per-unit pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_unit_attempts: usize,
    /// Retry a failed unit attempt instead of failing the unit immediately
    pub auto_fix: bool,
    pub critic_threshold: f64,
    pub max_snippets: usize,
    pub snippet_max_lines: usize,
    pub subagent_max_attempts: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub tree_preview_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_unit_attempts: 2,
            auto_fix: true,
            critic_threshold: DEFAULT_CRITIC_THRESHOLD,
            max_snippets: 8,
            snippet_max_lines: 220,
            subagent_max_attempts: 4,
            temperature: 0.2,
            max_tokens: 4096,
            tree_preview_entries: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Quality-gate commands, run in order
    pub commands: Vec<String>,
    /// Run the informational preflight pass
    pub preflight: bool,
    /// Per-unit checks and a failing final pass fail the run
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Programs the command executor may launch
    pub allowed_programs: Vec<String>,
    /// Extra path prefixes that may never be mutated
    pub protected_paths: Vec<String>,
    pub rollback_on_failure: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allowed_programs: [
                "cargo", "npm", "npx", "pnpm", "yarn", "bun", "node", "python", "python3",
                "pytest", "go", "make", "ruff", "mypy", "tsc", "eslint", "git", "ls", "cat",
                "rg", "grep",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            protected_paths: Vec::new(),
            rollback_on_failure: true,
        }
    }
}

/// Subagent cache limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub budgets: BudgetConfig,
    pub pipeline: PipelineConfig,
    pub verification: VerificationConfig,
    pub safety: SafetyConfig,
    pub cache: CacheConfig,
    pub dry_run: bool,
    /// Skill documents to load into planning and coding prompts
    pub skills: Vec<String>,
}

impl RunConfig {
    // ==================== Builder Methods ====================

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_strict_verification(mut self, strict: bool) -> Self {
        self.verification.strict = strict;
        self
    }

    pub fn with_verification_commands(mut self, commands: Vec<String>) -> Self {
        self.verification.commands = commands;
        self
    }

    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.budgets.max_parallel_work_units = max.max(1);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.budgets.max_iterations = max;
        self
    }

    pub fn with_rollback(mut self, enabled: bool) -> Self {
        self.safety.rollback_on_failure = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.pipeline.max_unit_attempts, 2);
        assert_eq!(config.budgets.max_replans, 3);
        assert_eq!(config.budgets.command_timeout, Duration::from_secs(120));
        assert_eq!(config.pipeline.critic_threshold, 0.62);
        assert!(config.safety.rollback_on_failure);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::default()
            .with_dry_run(true)
            .with_max_parallel(0)
            .with_strict_verification(true)
            .with_verification_commands(vec!["cargo test".into()]);
        assert!(config.dry_run);
        assert_eq!(config.budgets.max_parallel_work_units, 1);
        assert!(config.verification.strict);
        assert_eq!(config.verification.commands.len(), 1);
    }
}
