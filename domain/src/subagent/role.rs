//! Subagent roles and model tiers

use serde::{Deserialize, Serialize};

/// Model capability tier used for routing subagent calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheaper, faster model for read-mostly roles
    Light,
    /// More capable model for decisions and code generation
    Heavy,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Light => "light",
            ModelTier::Heavy => "heavy",
        }
    }

    /// Relative cost weight applied to token estimates.
    pub fn cost_weight(&self) -> f64 {
        match self {
            ModelTier::Light => 1.0,
            ModelTier::Heavy => 2.2,
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reasoning role in the multi-agent pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubagentRole {
    /// Decomposes the goal into work units and repairs the dependency graph
    Supervisor,
    /// Surveys the workspace for relevant files and risks
    Scout,
    /// Designs the approach and write targets for a unit
    Planner,
    /// Produces concrete file changes
    Coder,
    /// Scores proposed changes against the unit objective
    Critic,
    /// Summarizes the run
    Synthesizer,
}

impl SubagentRole {
    pub const ALL: [SubagentRole; 6] = [
        SubagentRole::Supervisor,
        SubagentRole::Scout,
        SubagentRole::Planner,
        SubagentRole::Coder,
        SubagentRole::Critic,
        SubagentRole::Synthesizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubagentRole::Supervisor => "supervisor",
            SubagentRole::Scout => "scout",
            SubagentRole::Planner => "planner",
            SubagentRole::Coder => "coder",
            SubagentRole::Critic => "critic",
            SubagentRole::Synthesizer => "synthesizer",
        }
    }

    /// Tier used when nothing overrides the routing.
    pub fn default_tier(&self) -> ModelTier {
        match self {
            SubagentRole::Scout | SubagentRole::Planner => ModelTier::Light,
            SubagentRole::Supervisor
            | SubagentRole::Coder
            | SubagentRole::Critic
            | SubagentRole::Synthesizer => ModelTier::Heavy,
        }
    }

    /// Whether identical inputs may be answered from the artifact cache.
    ///
    /// Only read-only roles qualify.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, SubagentRole::Scout | SubagentRole::Planner)
    }
}

impl std::fmt::Display for SubagentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubagentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubagentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown subagent role: {}", s))
    }
}
