//! Coarse failure categories for the failure heatmap

use serde::{Deserialize, Serialize};

/// Coarse label attached to every unit-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailureCategory {
    Timeout,
    CriticGate,
    Verification,
    ParseError,
    Dependency,
    SafetyPolicy,
    Unknown,
}

impl UnitFailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitFailureCategory::Timeout => "timeout",
            UnitFailureCategory::CriticGate => "critic_gate",
            UnitFailureCategory::Verification => "verification",
            UnitFailureCategory::ParseError => "parse_error",
            UnitFailureCategory::Dependency => "dependency",
            UnitFailureCategory::SafetyPolicy => "safety_policy",
            UnitFailureCategory::Unknown => "unknown",
        }
    }

    /// Classify a free-form error message by keyword.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["timed out", "timeout"]) {
            UnitFailureCategory::Timeout
        } else if has(&["dependency", "cycle"]) {
            UnitFailureCategory::Dependency
        } else if has(&["policy", "protected", "not allow", "budget", "traversal", "denied"]) {
            UnitFailureCategory::SafetyPolicy
        } else if has(&["verification"]) {
            UnitFailureCategory::Verification
        } else if has(&["parse", "json", "schema"]) {
            UnitFailureCategory::ParseError
        } else if has(&["critic", "confidence", "score", "evidence gate"]) {
            UnitFailureCategory::CriticGate
        } else {
            UnitFailureCategory::Unknown
        }
    }
}

impl std::fmt::Display for UnitFailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_messages() {
        let cases = [
            ("Command timed out after 120s", UnitFailureCategory::Timeout),
            ("Dependency failed", UnitFailureCategory::Dependency),
            ("path is protected (git internals): .git/x", UnitFailureCategory::SafetyPolicy),
            ("File write budget exhausted (20/20)", UnitFailureCategory::SafetyPolicy),
            ("Unit verification failed: cargo clippy", UnitFailureCategory::Verification),
            ("coder output could not be parsed as JSON", UnitFailureCategory::ParseError),
            ("Critic score 0.40 below threshold 0.62", UnitFailureCategory::CriticGate),
            ("something odd happened", UnitFailureCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(UnitFailureCategory::classify(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&UnitFailureCategory::CriticGate).unwrap();
        assert_eq!(json, "\"critic_gate\"");
    }
}
