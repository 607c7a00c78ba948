//! Cost and latency accounting per (role, tier).

use crate::run::failure::UnitFailureCategory;
use crate::subagent::role::{ModelTier, SubagentRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Estimated cost of 1k tokens on the light tier.
pub const BASE_COST_PER_1K_TOKENS: f64 = 0.002;

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(chars: usize) -> u64 {
    chars.div_ceil(4) as u64
}

pub fn estimate_cost(tier: ModelTier, input_tokens: u64, output_tokens: u64) -> f64 {
    (input_tokens + output_tokens) as f64 / 1000.0 * BASE_COST_PER_1K_TOKENS * tier.cost_weight()
}

/// Counters accumulated for one (role, tier) pair during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityMetric {
    pub calls: u64,
    pub cache_hits: u64,
    pub retries: u64,
    pub escalations: u64,
    pub failures: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_estimate: f64,
    pub latency_ms: u64,
}

impl ObservabilityMetric {
    pub fn merge(&mut self, other: &ObservabilityMetric) {
        self.calls += other.calls;
        self.cache_hits += other.cache_hits;
        self.retries += other.retries;
        self.escalations += other.escalations;
        self.failures += other.failures;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost_estimate += other.cost_estimate;
        self.latency_ms += other.latency_ms;
    }
}

/// Metric key rendered as `role:tier`.
pub fn metric_key(role: SubagentRole, tier: ModelTier) -> String {
    format!("{}:{}", role.as_str(), tier.as_str())
}

/// Run-wide observability snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilitySummary {
    pub by_role: BTreeMap<String, ObservabilityMetric>,
    pub totals: ObservabilityMetric,
    /// Verification commands that kept failing after every retry
    pub verification_failures: BTreeMap<String, u64>,
    pub failure_heatmap: BTreeMap<UnitFailureCategory, u64>,
}

impl ObservabilitySummary {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.totals.calls == 0 {
            0.0
        } else {
            self.totals.cache_hits as f64 / self.totals.calls as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(8), 2);
        assert_eq!(estimate_tokens(9), 3);
    }

    #[test]
    fn test_heavy_tier_costs_more() {
        let light = estimate_cost(ModelTier::Light, 1000, 0);
        let heavy = estimate_cost(ModelTier::Heavy, 1000, 0);
        assert!((light - 0.002).abs() < 1e-12);
        assert!((heavy - 0.0044).abs() < 1e-12);
    }

    #[test]
    fn test_merge_and_hit_rate() {
        let mut summary = ObservabilitySummary::default();
        summary.totals.merge(&ObservabilityMetric {
            calls: 4,
            cache_hits: 1,
            ..Default::default()
        });
        assert_eq!(summary.cache_hit_rate(), 0.25);
        assert_eq!(metric_key(SubagentRole::Coder, ModelTier::Heavy), "coder:heavy");
    }
}
