//! Gate thresholds and decisions

use serde::{Deserialize, Serialize};

/// Coder confidence below which a heavy-tier second opinion is requested.
pub const CODER_ESCALATION_CONFIDENCE: f64 = 0.55;

/// Coder confidence below which changes are never applied.
pub const MIN_CODER_CONFIDENCE: f64 = 0.35;

/// Width of the band under the threshold that earns a critic re-review.
pub const CRITIC_REREVIEW_MARGIN: f64 = 0.08;

/// Minimum critic score for last-resort acceptance on the final attempt.
pub const LAST_RESORT_SCORE_FLOOR: f64 = 0.45;

pub const DEFAULT_CRITIC_THRESHOLD: f64 = 0.62;

pub fn should_escalate_coder(confidence: f64) -> bool {
    confidence < CODER_ESCALATION_CONFIDENCE
}

/// The escalated output replaces the original only if it is strictly more
/// confident; on a tie the original answer stands.
pub fn prefer_escalated(original_confidence: f64, escalated_confidence: f64) -> bool {
    escalated_confidence > original_confidence
}

/// Near-miss critic scores without blocking issues get one more look.
pub fn should_rereview(score: f64, blocking_issues: usize, threshold: f64) -> bool {
    blocking_issues == 0 && score < threshold && score >= threshold - CRITIC_REREVIEW_MARGIN
}

/// Inputs to the accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInput {
    pub critic_score: f64,
    pub blocking_issues: usize,
    pub coder_confidence: f64,
    pub threshold: f64,
    /// This is the last attempt the unit is allowed
    pub final_attempt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum GateDecision {
    Accept,
    AcceptWithWarning(String),
    Reject(String),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, GateDecision::Reject(_))
    }
}

/// Decide whether the coder's changes may be applied.
pub fn decide(input: GateInput) -> GateDecision {
    if input.blocking_issues > 0 {
        return GateDecision::Reject(format!(
            "Critic reported {} blocking issue(s)",
            input.blocking_issues
        ));
    }

    let low_confidence = input.coder_confidence < MIN_CODER_CONFIDENCE;
    let low_score = input.critic_score < input.threshold;
    if !low_confidence && !low_score {
        return GateDecision::Accept;
    }

    if input.final_attempt
        && !low_confidence
        && input.critic_score >= LAST_RESORT_SCORE_FLOOR
    {
        return GateDecision::AcceptWithWarning(format!(
            "Accepted on final attempt with critic score {:.2} below threshold {:.2}",
            input.critic_score, input.threshold
        ));
    }

    if low_confidence {
        GateDecision::Reject(format!(
            "Coder confidence {:.2} below minimum {:.2}",
            input.coder_confidence, MIN_CODER_CONFIDENCE
        ))
    } else {
        GateDecision::Reject(format!(
            "Critic score {:.2} below threshold {:.2}",
            input.critic_score, input.threshold
        ))
    }
}

/// Evidence the unit gathered before mutating.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvidenceInput {
    /// Retrieved memory asks for verification before any mutation
    pub verification_required: bool,
    pub file_snippets: usize,
    pub scout_relevant_files: usize,
    pub planner_test_focus: usize,
}

/// Refuse to mutate on conflicting memory guidance unless some evidence exists.
pub fn evidence_gate(input: EvidenceInput) -> Result<(), String> {
    if !input.verification_required {
        return Ok(());
    }
    if input.file_snippets > 0 || input.scout_relevant_files > 0 || input.planner_test_focus > 0
    {
        return Ok(());
    }
    Err("Evidence gate: memory reports conflicting guidance and no supporting evidence \
         (file snippets, scout findings or test focus) was gathered"
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(score: f64, confidence: f64, final_attempt: bool) -> GateInput {
        GateInput {
            critic_score: score,
            blocking_issues: 0,
            coder_confidence: confidence,
            threshold: DEFAULT_CRITIC_THRESHOLD,
            final_attempt,
        }
    }

    #[test]
    fn test_accept_above_threshold() {
        assert_eq!(decide(input(0.8, 0.9, false)), GateDecision::Accept);
    }

    #[test]
    fn test_near_miss_rejected_then_accepted_on_final_attempt() {
        assert!(!decide(input(0.58, 0.7, false)).is_accepted());
        assert!(matches!(
            decide(input(0.58, 0.7, true)),
            GateDecision::AcceptWithWarning(_)
        ));
    }

    #[test]
    fn test_last_resort_floor() {
        assert!(!decide(input(0.44, 0.9, true)).is_accepted());
        assert!(decide(input(0.45, 0.9, true)).is_accepted());
    }

    #[test]
    fn test_low_confidence_never_accepted() {
        assert!(!decide(input(0.9, 0.2, false)).is_accepted());
        assert!(!decide(input(0.9, 0.2, true)).is_accepted());
    }

    #[test]
    fn test_blocking_issues_reject() {
        let mut gate = input(0.95, 0.95, true);
        gate.blocking_issues = 1;
        assert!(!decide(gate).is_accepted());
    }

    #[test]
    fn test_rereview_band() {
        assert!(should_rereview(0.58, 0, 0.62));
        assert!(should_rereview(0.54, 0, 0.62));
        assert!(!should_rereview(0.53, 0, 0.62));
        assert!(!should_rereview(0.62, 0, 0.62));
        assert!(!should_rereview(0.6, 2, 0.62));
    }

    #[test]
    fn test_coder_escalation() {
        assert!(should_escalate_coder(0.2));
        assert!(!should_escalate_coder(0.55));
        assert!(!prefer_escalated(0.2, 0.2));
        assert!(prefer_escalated(0.2, 0.4));
        assert!(!prefer_escalated(0.3, 0.2));
    }

    #[test]
    fn test_evidence_gate() {
        let mut evidence = EvidenceInput {
            verification_required: true,
            ..Default::default()
        };
        assert!(evidence_gate(evidence).is_err());
        evidence.planner_test_focus = 1;
        assert!(evidence_gate(evidence).is_ok());
        assert!(evidence_gate(EvidenceInput::default()).is_ok());
    }
}
