//! JSON extraction from free-form model output.
//!
//! Models are asked for exactly one JSON object but regularly wrap it in
//! prose or markdown fences. [`extract_json_object`] recovers the object in
//! three stages:
//!
//! | Stage | Input shape |
//! |-------|-------------|
//! | 1 | The whole response is a JSON object |
//! | 2 | A fenced ```` ```json ```` (or bare ```` ``` ````) block |
//! | 3 | The substring from the first `{` to the last `}` |

use super::outputs::SubagentOutput;
use serde_json::Value;
use thiserror::Error;

/// Why a raw model response could not be turned into a role output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("response does not match schema: {0}")]
    Schema(String),

    #[error("invalid output: {0}")]
    Invalid(String),
}

/// Extract the single JSON object embedded in `raw`.
pub fn extract_json_object(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut saw_non_object = false;
    let candidates = [
        Some(trimmed),
        fenced_block(trimmed),
        brace_span(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => saw_non_object = true,
            Err(_) => {}
        }
    }

    if saw_non_object {
        Err(ParseError::NotAnObject)
    } else {
        Err(ParseError::NoJsonObject)
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode an already-extracted JSON value into a role schema and validate it.
pub fn decode_output<T: SubagentOutput>(value: Value) -> Result<T, ParseError> {
    let output: T =
        serde_json::from_value(value).map_err(|e| ParseError::Schema(e.to_string()))?;
    output.validate().map_err(ParseError::Invalid)?;
    Ok(output)
}

/// Extract and decode in one step.
pub fn parse_output<T: SubagentOutput>(raw: &str) -> Result<T, ParseError> {
    decode_output(extract_json_object(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subagent::outputs::CriticOutput;

    #[test]
    fn test_plain_json() {
        let value = extract_json_object(r#"{"score": 0.7}"#).unwrap();
        assert_eq!(value["score"], 0.7);
    }

    #[test]
    fn test_fenced_json() {
        let raw = "Here you go:\n```json\n{\"summary\": \"ok\"}\n```\nThanks";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn test_brace_span_with_prose() {
        let raw = "Result follows {\"a\": {\"b\": 1}} and that's it";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_no_object() {
        assert_eq!(
            extract_json_object("I could not do it"),
            Err(ParseError::NoJsonObject)
        );
        assert_eq!(extract_json_object("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert_eq!(extract_json_object("[1, 2]"), Err(ParseError::NotAnObject));
    }

    #[test]
    fn test_parse_output_schema_error() {
        let err = parse_output::<CriticOutput>(r#"{"summary": "no score"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Schema(_)));
    }

    #[test]
    fn test_parse_output_validation_error() {
        let err = parse_output::<CriticOutput>(r#"{"summary": "x", "score": 3.5}"#).unwrap_err();
        assert!(matches!(err, ParseError::Invalid(_)));
    }

    #[test]
    fn test_parse_output_ok() {
        let critic: CriticOutput =
            parse_output("```json\n{\"summary\": \"fine\", \"score\": 0.8}\n```").unwrap();
        assert_eq!(critic.score, 0.8);
        assert!(critic.blocking_issues.is_empty());
    }
}
