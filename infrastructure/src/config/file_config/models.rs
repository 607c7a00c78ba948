//! Model routing configuration from TOML (`[models]` section)

use super::ConfigIssue;
use cohort_application::config::ModelRouting;
use cohort_domain::{Model, SubagentRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model routing configuration from TOML
///
/// # Example
///
/// ```toml
/// [models]
/// light = "claude-haiku-4.5"      # scout, planner
/// heavy = "claude-sonnet-4.5"     # supervisor, coder, critic, synthesizer
/// override = "gpt-5.2-codex"      # pins every role when set
///
/// [models.roles]
/// coder = "gpt-5.2-codex"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelsConfig {
    pub light: Option<String>,
    pub heavy: Option<String>,
    #[serde(rename = "override")]
    pub override_model: Option<String>,
    /// Per-role model, keyed by role name
    pub roles: BTreeMap<String, String>,
}

fn parse_model(field: &str, value: Option<&String>, issues: &mut Vec<ConfigIssue>) -> Option<Model> {
    match value {
        None => None,
        Some(s) if s.trim().is_empty() => {
            issues.push(ConfigIssue::error(format!(
                "models.{}: model name cannot be empty",
                field
            )));
            None
        }
        // Unknown names become Model::Custom
        Some(s) => s.trim().parse().ok(),
    }
}

impl FileModelsConfig {
    /// Build the run's routing, reporting unusable entries.
    pub fn to_routing(&self) -> (ModelRouting, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut routing = ModelRouting::default();

        if let Some(model) = parse_model("light", self.light.as_ref(), &mut issues) {
            routing.light = model;
        }
        if let Some(model) = parse_model("heavy", self.heavy.as_ref(), &mut issues) {
            routing.heavy = model;
        }
        routing.override_model = parse_model("override", self.override_model.as_ref(), &mut issues);

        for (name, value) in &self.roles {
            let field = format!("roles.{}", name);
            match name.parse::<SubagentRole>() {
                Ok(role) => {
                    if let Some(model) = parse_model(&field, Some(value), &mut issues) {
                        routing = routing.with_role_model(role, model);
                    }
                }
                Err(e) => issues.push(ConfigIssue::warning(format!("models.{}: {}", field, e))),
            }
        }

        (routing, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let (routing, issues) = FileModelsConfig::default().to_routing();
        assert_eq!(routing, ModelRouting::default());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_tiers_roles_and_override() {
        let config: FileModelsConfig = toml::from_str(
            r#"
light = "gpt-5-mini"
override = "my-local-model"

[roles]
coder = "gpt-5.2-codex"
"#,
        )
        .unwrap();
        let (routing, issues) = config.to_routing();
        assert!(issues.is_empty());
        assert_eq!(routing.light, Model::Gpt5Mini);
        assert_eq!(routing.heavy, Model::default_heavy());
        assert_eq!(
            routing.override_model,
            Some(Model::Custom("my-local-model".into()))
        );
        assert_eq!(
            routing.role_overrides.get(&SubagentRole::Coder),
            Some(&Model::Gpt52Codex)
        );
    }

    #[test]
    fn test_bad_entries_are_reported() {
        let mut config = FileModelsConfig {
            heavy: Some("  ".into()),
            ..Default::default()
        };
        config.roles.insert("reviewer".into(), "gpt-5-mini".into());

        let (routing, issues) = config.to_routing();
        assert_eq!(routing.heavy, Model::default_heavy());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.is_error()));
    }
}
