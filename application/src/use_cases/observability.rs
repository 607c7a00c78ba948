//! Observability Tracker
//!
//! Accumulates cost, latency and failure counters for the whole run. Every
//! update is additive; nothing is reset mid-run.

use cohort_domain::observability::{estimate_cost, estimate_tokens, metric_key};
use cohort_domain::{
    ModelTier, ObservabilityMetric, ObservabilitySummary, SubagentRole, UnitFailureCategory,
};
use std::sync::Mutex;

/// One subagent call as seen by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub role: SubagentRole,
    pub tier: ModelTier,
    pub cache_hit: bool,
    /// Corrective retries after the first attempt
    pub retries: usize,
    pub escalated: bool,
    pub failed: bool,
    pub input_chars: usize,
    pub output_chars: usize,
    pub latency_ms: u64,
}

impl CallRecord {
    pub fn new(role: SubagentRole, tier: ModelTier) -> Self {
        Self {
            role,
            tier,
            cache_hit: false,
            retries: 0,
            escalated: false,
            failed: false,
            input_chars: 0,
            output_chars: 0,
            latency_ms: 0,
        }
    }
}

#[derive(Default)]
pub struct ObservabilityTracker {
    summary: Mutex<ObservabilitySummary>,
}

impl ObservabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_summary<R>(&self, f: impl FnOnce(&mut ObservabilitySummary) -> R) -> R {
        let mut guard = match self.summary.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn record_call(&self, record: &CallRecord) {
        let mut metric = ObservabilityMetric {
            calls: 1,
            retries: record.retries as u64,
            escalations: u64::from(record.escalated),
            failures: u64::from(record.failed),
            ..Default::default()
        };
        if record.cache_hit {
            metric.cache_hits = 1;
        } else {
            metric.input_tokens = estimate_tokens(record.input_chars);
            metric.output_tokens = estimate_tokens(record.output_chars);
            metric.cost_estimate =
                estimate_cost(record.tier, metric.input_tokens, metric.output_tokens);
            metric.latency_ms = record.latency_ms;
        }

        self.with_summary(|summary| {
            summary
                .by_role
                .entry(metric_key(record.role, record.tier))
                .or_default()
                .merge(&metric);
            summary.totals.merge(&metric);
        });
    }

    /// A verification command that never recovered within its retries.
    pub fn record_verification_failure(&self, command: &str) {
        self.with_summary(|summary| {
            *summary
                .verification_failures
                .entry(command.to_string())
                .or_default() += 1;
        });
    }

    pub fn record_unit_failure(&self, category: UnitFailureCategory) {
        self.with_summary(|summary| {
            *summary.failure_heatmap.entry(category).or_default() += 1;
        });
    }

    pub fn snapshot(&self) -> ObservabilitySummary {
        self.with_summary(|summary| summary.clone())
    }
}
