use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Which step produced the parsed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    Direct,
    StripFences,
    OuterBraces,
    TrailingCommas,
}

/// Model output that stayed unparsable after every recovery step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model output is not recoverable JSON: {reason}")]
pub struct RecoveryError {
    pub reason: String,
}

fn fence_open() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("fence pattern compiles")
    })
}

fn fence_close() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\r?\n?```\s*$").expect("fence pattern compiles"))
}

fn trailing_comma() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r",\s*([}\]])").expect("comma pattern compiles"))
}

/// Removes a surrounding markdown code fence, if any.
pub fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let opened = fence_open().replace(trimmed, "");
    fence_close().replace(&opened, "").trim().to_string()
}

/// Slice between the first `{` and the last `}`.
fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses model output, trying direct parse, fence stripping, outer-brace
/// extraction and trailing-comma removal in that order.
pub fn recover_json(text: &str) -> Result<(Value, RecoveryStrategy), RecoveryError> {
    if text.trim().is_empty() {
        return Err(RecoveryError {
            reason: "empty response".to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok((value, RecoveryStrategy::Direct));
    }

    let unfenced = strip_fences(text);
    if let Ok(value) = serde_json::from_str(&unfenced) {
        return Ok((value, RecoveryStrategy::StripFences));
    }

    let candidate = outer_braces(&unfenced).unwrap_or(&unfenced);
    if let Ok(value) = serde_json::from_str(candidate) {
        return Ok((value, RecoveryStrategy::OuterBraces));
    }

    let cleaned = trailing_comma().replace_all(candidate, "$1");
    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok((value, RecoveryStrategy::TrailingCommas)),
        Err(err) => {
            debug!(error = %err, "all recovery strategies failed");
            Err(RecoveryError {
                reason: err.to_string(),
            })
        }
    }
}

/// Like [`recover_json`] but requires a JSON object.
pub fn recover_object(
    text: &str,
) -> Result<(serde_json::Map<String, Value>, RecoveryStrategy), RecoveryError> {
    match recover_json(text)? {
        (Value::Object(map), strategy) => Ok((map, strategy)),
        (other, _) => Err(RecoveryError {
            reason: format!("expected a JSON object, found {}", kind_name(&other)),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_json_directly() {
        let (value, strategy) = recover_json(r#"{"score": 8}"#).expect("parses");
        assert_eq!(value, json!({"score": 8}));
        assert_eq!(strategy, RecoveryStrategy::Direct);
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "```json\n{\"score\": 8, \"recommendation\": \"Keep going\"}\n```";
        let (value, strategy) = recover_json(text).expect("parses");
        assert_eq!(value["score"], json!(8));
        assert_eq!(strategy, RecoveryStrategy::StripFences);
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = "Here is the assessment:\n{\"score\": 6}\nLet me know if you need more.";
        let (value, strategy) = recover_json(text).expect("parses");
        assert_eq!(value, json!({"score": 6}));
        assert_eq!(strategy, RecoveryStrategy::OuterBraces);
    }

    #[test]
    fn removes_trailing_commas() {
        let text = "```json\n{\"flags\": {\"red\": [\"a\",], \"green\": [],},}\n```";
        let (value, strategy) = recover_json(text).expect("parses");
        assert_eq!(value, json!({"flags": {"red": ["a"], "green": []}}));
        assert_eq!(strategy, RecoveryStrategy::TrailingCommas);
    }

    #[test]
    fn rejects_non_json_text() {
        assert!(recover_json("I cannot help with that request.").is_err());
        assert!(recover_json("   ").is_err());
        assert!(recover_json("{ not: json at all }").is_err());
    }

    #[test]
    fn object_recovery_rejects_arrays() {
        let err = recover_object("[1, 2, 3]").unwrap_err();
        assert!(err.reason.contains("an array"));
    }
}
