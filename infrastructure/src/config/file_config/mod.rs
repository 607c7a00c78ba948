//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into the application's
//! [`RunConfig`] and [`ModelRouting`].

mod models;
mod provider;
mod run;

pub use models::FileModelsConfig;
pub use provider::{FileOutputConfig, FileOutputFormat, FileProviderConfig};
pub use run::{
    FileBudgetsConfig, FileCacheConfig, FilePipelineConfig, FileSafetyConfig,
    FileVerificationConfig,
};

use cohort_application::config::{ModelRouting, RunConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found while validating the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub message: String,
}

impl ConfigIssue {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Tier and role model selection
    pub models: FileModelsConfig,
    pub budgets: FileBudgetsConfig,
    pub pipeline: FilePipelineConfig,
    pub verification: FileVerificationConfig,
    pub safety: FileSafetyConfig,
    pub cache: FileCacheConfig,
    /// Chat-completions endpoint
    pub provider: FileProviderConfig,
    pub output: FileOutputConfig,
    /// Skill ids loaded into every prompt
    pub skills: Vec<String>,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.models.to_routing().1;

        let threshold = self.pipeline.critic_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            issues.push(ConfigIssue::error(format!(
                "pipeline.critic_threshold: {} is outside [0, 1]",
                threshold
            )));
        }
        if self.pipeline.max_unit_attempts == 0 {
            issues.push(ConfigIssue::error(
                "pipeline.max_unit_attempts: must be at least 1",
            ));
        }
        if self.verification.strict && self.verification.commands.is_empty() {
            issues.push(ConfigIssue::warning(
                "verification.strict is set but no verification commands are configured",
            ));
        }
        if self.provider.base_url.trim().is_empty() {
            issues.push(ConfigIssue::error("provider.base_url: cannot be empty"));
        }

        issues
    }

    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            budgets: self.budgets.to_budgets(),
            pipeline: self.pipeline.clone(),
            verification: self.verification.clone(),
            safety: self.safety.to_safety(),
            cache: self.cache.clone(),
            dry_run: false,
            skills: self.skills.clone(),
        }
    }

    pub fn to_model_routing(&self) -> ModelRouting {
        self.models.to_routing().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_domain::Model;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
skills = ["rust-style"]

[models]
light = "gpt-5-mini"
heavy = "claude-opus-4.5"

[budgets]
max_iterations = 10
max_parallel_work_units = 2

[pipeline]
critic_threshold = 0.7

[verification]
commands = ["cargo clippy", "cargo test"]
strict = true

[safety]
protected_paths = ["secrets/"]
rollback_on_failure = false

[cache]
max_entries = 32

[provider]
base_url = "http://localhost:8080/v1"

[output]
format = "json"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());

        let run = config.to_run_config();
        assert_eq!(run.budgets.max_iterations, 10);
        assert_eq!(run.budgets.max_parallel_work_units, 2);
        assert_eq!(run.budgets.max_replans, 3);
        assert_eq!(run.pipeline.critic_threshold, 0.7);
        assert_eq!(run.pipeline.max_unit_attempts, 2);
        assert!(run.verification.strict);
        assert_eq!(run.verification.commands.len(), 2);
        assert!(!run.safety.rollback_on_failure);
        assert_eq!(run.cache.max_entries, 32);
        assert_eq!(run.skills, vec!["rust-style".to_string()]);

        let routing = config.to_model_routing();
        assert_eq!(routing.light, Model::Gpt5Mini);
        assert_eq!(routing.heavy, Model::ClaudeOpus45);
        assert_eq!(config.output.format, FileOutputFormat::Json);
    }

    #[test]
    fn test_default_config_matches_application_defaults() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.to_run_config(), RunConfig::default());
        assert_eq!(config.to_model_routing(), ModelRouting::default());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let config: FileConfig = toml::from_str(
            r#"
[pipeline]
critic_threshold = 1.5
max_unit_attempts = 0

[verification]
strict = true
"#,
        )
        .unwrap();
        let issues = config.validate();
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 2);
        assert_eq!(issues.iter().filter(|i| !i.is_error()).count(), 1);
    }
}
