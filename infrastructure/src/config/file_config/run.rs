//! Run settings from TOML: `[budgets]`, `[pipeline]`, `[verification]`,
//! `[safety]` and `[cache]`.

use cohort_application::config::{
    BudgetConfig, CacheConfig, PipelineConfig, SafetyConfig, VerificationConfig,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBudgetsConfig {
    pub max_iterations: usize,
    pub max_parallel_work_units: usize,
    pub max_file_writes: usize,
    pub max_command_runs: usize,
    pub max_replans: usize,
    pub command_timeout_secs: u64,
}

impl Default for FileBudgetsConfig {
    fn default() -> Self {
        let defaults = BudgetConfig::default();
        Self {
            max_iterations: defaults.max_iterations,
            max_parallel_work_units: defaults.max_parallel_work_units,
            max_file_writes: defaults.max_file_writes,
            max_command_runs: defaults.max_command_runs,
            max_replans: defaults.max_replans,
            command_timeout_secs: defaults.command_timeout.as_secs(),
        }
    }
}

impl FileBudgetsConfig {
    pub fn to_budgets(&self) -> BudgetConfig {
        BudgetConfig {
            max_iterations: self.max_iterations.max(1),
            max_parallel_work_units: self.max_parallel_work_units.max(1),
            max_file_writes: self.max_file_writes,
            max_command_runs: self.max_command_runs,
            max_replans: self.max_replans,
            command_timeout: Duration::from_secs(self.command_timeout_secs.max(1)),
        }
    }
}

/// `[pipeline]` uses the application type directly.
pub type FilePipelineConfig = PipelineConfig;

/// `[verification]` uses the application type directly.
pub type FileVerificationConfig = VerificationConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSafetyConfig {
    pub allowed_programs: Vec<String>,
    /// Programs added on top of `allowed_programs`
    pub extra_programs: Vec<String>,
    pub protected_paths: Vec<String>,
    pub rollback_on_failure: bool,
}

impl Default for FileSafetyConfig {
    fn default() -> Self {
        let defaults = SafetyConfig::default();
        Self {
            allowed_programs: defaults.allowed_programs,
            extra_programs: Vec::new(),
            protected_paths: defaults.protected_paths,
            rollback_on_failure: defaults.rollback_on_failure,
        }
    }
}

impl FileSafetyConfig {
    pub fn to_safety(&self) -> SafetyConfig {
        let mut allowed_programs = self.allowed_programs.clone();
        for program in &self.extra_programs {
            if !allowed_programs.contains(program) {
                allowed_programs.push(program.clone());
            }
        }
        SafetyConfig {
            allowed_programs,
            protected_paths: self.protected_paths.clone(),
            rollback_on_failure: self.rollback_on_failure,
        }
    }
}

/// `[cache]` uses the application type directly.
pub type FileCacheConfig = CacheConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_defaults_match_application() {
        assert_eq!(FileBudgetsConfig::default().to_budgets(), BudgetConfig::default());
    }

    #[test]
    fn test_budget_floors() {
        let budgets = FileBudgetsConfig {
            max_iterations: 0,
            max_parallel_work_units: 0,
            command_timeout_secs: 0,
            ..Default::default()
        }
        .to_budgets();
        assert_eq!(budgets.max_iterations, 1);
        assert_eq!(budgets.max_parallel_work_units, 1);
        assert_eq!(budgets.command_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_extra_programs_extend_allow_list() {
        let safety: FileSafetyConfig = toml::from_str(
            r#"
extra_programs = ["just", "cargo"]
protected_paths = ["migrations/"]
"#,
        )
        .unwrap();
        let safety = safety.to_safety();
        assert!(safety.allowed_programs.contains(&"just".to_string()));
        assert_eq!(
            safety
                .allowed_programs
                .iter()
                .filter(|p| p.as_str() == "cargo")
                .count(),
            1
        );
        assert_eq!(safety.protected_paths, vec!["migrations/".to_string()]);
        assert!(safety.rollback_on_failure);
    }
}
