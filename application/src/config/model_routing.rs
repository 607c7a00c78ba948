//! Role and tier to model resolution, fixed once per run.

use cohort_domain::{Model, ModelTier, SubagentRole};
use std::collections::BTreeMap;

/// Which model serves each role.
///
/// Resolution order: a run-level override pins every role; otherwise a
/// per-role override applies when no tier was forced; otherwise the tier's
/// model is used.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRouting {
    pub light: Model,
    pub heavy: Model,
    pub override_model: Option<Model>,
    pub role_overrides: BTreeMap<SubagentRole, Model>,
}

impl Default for ModelRouting {
    fn default() -> Self {
        Self {
            light: Model::default_light(),
            heavy: Model::default_heavy(),
            override_model: None,
            role_overrides: BTreeMap::new(),
        }
    }
}

impl ModelRouting {
    pub fn with_override(mut self, model: Option<Model>) -> Self {
        self.override_model = model;
        self
    }

    pub fn with_role_model(mut self, role: SubagentRole, model: Model) -> Self {
        self.role_overrides.insert(role, model);
        self
    }

    pub fn model_for_tier(&self, tier: ModelTier) -> &Model {
        match tier {
            ModelTier::Light => &self.light,
            ModelTier::Heavy => &self.heavy,
        }
    }

    /// Model and tier for a call, honoring an explicit tier override.
    pub fn resolve(&self, role: SubagentRole, tier_override: Option<ModelTier>) -> (Model, ModelTier) {
        let tier = tier_override.unwrap_or_else(|| role.default_tier());

        if let Some(model) = &self.override_model {
            return (model.clone(), tier);
        }
        if tier_override.is_none()
            && let Some(model) = self.role_overrides.get(&role)
        {
            return (model.clone(), tier);
        }
        (self.model_for_tier(tier).clone(), tier)
    }
}
