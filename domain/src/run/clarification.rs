//! Clarification gate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A question the user may need to answer before the run mutates anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub id: String,
    pub question: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ClarificationQuestion {
    pub fn required(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            required: true,
        }
    }

    pub fn optional(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(id, question)
        }
    }
}

/// Questions and the answers collected so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    /// Whether the gate is enforced for this run
    pub required: bool,
    pub questions: Vec<ClarificationQuestion>,
    pub answers: BTreeMap<String, String>,
}

impl Clarification {
    /// Required questions without a non-blank answer.
    ///
    /// Always empty when the gate is not enforced.
    pub fn missing_answers(&self) -> Vec<&ClarificationQuestion> {
        if !self.required {
            return Vec::new();
        }
        self.questions
            .iter()
            .filter(|q| q.required)
            .filter(|q| {
                self.answers
                    .get(&q.id)
                    .is_none_or(|answer| answer.trim().is_empty())
            })
            .collect()
    }

    /// Render answered questions for prompts.
    pub fn render_answers(&self) -> String {
        self.questions
            .iter()
            .filter_map(|q| {
                self.answers
                    .get(&q.id)
                    .filter(|a| !a.trim().is_empty())
                    .map(|a| format!("- {}: {}", q.question, a.trim()))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clarification() -> Clarification {
        Clarification {
            required: true,
            questions: vec![
                ClarificationQuestion::required("framework", "Which web framework?"),
                ClarificationQuestion::optional("style", "Preferred style?"),
            ],
            answers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_missing_required_answer() {
        let c = clarification();
        let missing = c.missing_answers();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "framework");
    }

    #[test]
    fn test_blank_answer_counts_as_missing() {
        let mut c = clarification();
        c.answers.insert("framework".into(), "   ".into());
        assert_eq!(c.missing_answers().len(), 1);

        c.answers.insert("framework".into(), "axum".into());
        assert!(c.missing_answers().is_empty());
        assert_eq!(c.render_answers(), "- Which web framework?: axum");
    }

    #[test]
    fn test_not_enforced_gate_never_blocks() {
        let mut c = clarification();
        c.required = false;
        assert!(c.missing_answers().is_empty());
    }
}
