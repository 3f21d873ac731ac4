//! Normalization of heterogeneously stored catalog attributes.
//!
//! The catalog was populated by two import paths with different
//! serialization: attribute lists may arrive as a native JSON array, a
//! comma- or whitespace-delimited string, or a JSON array serialized into a
//! string. Score maps may be a structured `{key: float}` object or a
//! free-text `key(value)` pattern. Everything downstream of this module
//! only ever sees canonical token sequences and plain floats.

use serde_json::Value;

/// UI truncation cap for accord chips. Applied by callers, never here.
pub const ACCORD_DISPLAY_CAP: usize = 6;

/// Normalizes an attribute value into an ordered token sequence.
///
/// Order of strategies: native array → JSON-encoded array string →
/// comma-delimited string → whitespace-delimited string. Tokens are
/// trimmed, empties dropped, duplicates kept.
pub fn parse_tokens(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => tokens_from_list(items),
        Value::String(text) => tokens_from_text(text),
        _ => Vec::new(),
    }
}

/// Looks up a single float score under `key`, tolerating both the
/// structured-object and the `key(<number>)` pattern-string encodings.
/// Missing keys, malformed values, and unexpected shapes all yield 0.0.
pub fn parse_score(raw: &Value, key: &str) -> f64 {
    match raw {
        Value::Object(map) => map.get(key).map(number_value).unwrap_or(0.0),
        Value::String(text) => score_from_pattern(text, key),
        _ => 0.0,
    }
}

fn tokens_from_list(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(element_text)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn element_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn tokens_from_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
            return tokens_from_list(&items);
        }
    }

    if trimmed.contains(',') {
        trimmed.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
    } else {
        trimmed.split_whitespace().map(ToString::to_string).collect()
    }
}

fn number_value(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Case-insensitive scan for `key(<digits-and-dots>)`, returning the first
/// parseable capture. ASCII lowercasing keeps byte offsets stable for the
/// non-ASCII note names that surround the keys.
fn score_from_pattern(text: &str, key: &str) -> f64 {
    let haystack = text.to_ascii_lowercase();
    let needle = key.to_ascii_lowercase();
    if needle.is_empty() {
        return 0.0;
    }

    let mut search_from = 0;
    while let Some(offset) = haystack[search_from..].find(&needle) {
        let after_key = search_from + offset + needle.len();
        let rest = haystack[after_key..].trim_start();
        if let Some(inner) = rest.strip_prefix('(') {
            let captured: String =
                inner.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !captured.is_empty() && inner[captured.len()..].starts_with(')') {
                if let Ok(value) = captured.parse::<f64>() {
                    return value;
                }
            }
        }
        search_from = after_key;
    }

    0.0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_score, parse_tokens};

    #[test]
    fn all_three_encodings_yield_identical_tokens() {
        let expected = vec!["citrus".to_string(), "aquatic".to_string(), "green".to_string()];

        assert_eq!(parse_tokens(&json!(["citrus", "aquatic", "green"])), expected);
        assert_eq!(parse_tokens(&json!("citrus, aquatic, green")), expected);
        assert_eq!(parse_tokens(&json!("citrus aquatic green")), expected);
        assert_eq!(parse_tokens(&json!(r#"["citrus", "aquatic", "green"]"#)), expected);
    }

    #[test]
    fn list_elements_are_stringified_and_trimmed_without_dedup() {
        let tokens = parse_tokens(&json!([" woody ", 3, "woody", ""]));
        assert_eq!(tokens, vec!["woody", "3", "woody"]);
    }

    #[test]
    fn non_collection_input_yields_empty_sequence() {
        assert!(parse_tokens(&json!(null)).is_empty());
        assert!(parse_tokens(&json!(42)).is_empty());
        assert!(parse_tokens(&json!("")).is_empty());
        assert!(parse_tokens(&json!({"a": 1})).is_empty());
    }

    #[test]
    fn score_map_and_pattern_string_agree() {
        let structured = json!({"day": 47.1, "night": 25.9});
        let pattern = json!("day(47.1) / night(25.9)");

        assert_eq!(parse_score(&structured, "day"), 47.1);
        assert_eq!(parse_score(&pattern, "day"), 47.1);
        assert_eq!(parse_score(&structured, "night"), 25.9);
        assert_eq!(parse_score(&pattern, "night"), 25.9);
    }

    #[test]
    fn pattern_lookup_is_case_insensitive_and_tolerates_spacing() {
        assert_eq!(parse_score(&json!("Day (47.1)"), "day"), 47.1);
        assert_eq!(parse_score(&json!("DAY(12)"), "day"), 12.0);
    }

    #[test]
    fn missing_key_or_malformed_value_returns_exactly_zero() {
        assert_eq!(parse_score(&json!({"day": 47.1}), "night"), 0.0);
        assert_eq!(parse_score(&json!({"day": "n/a"}), "day"), 0.0);
        assert_eq!(parse_score(&json!("day()"), "day"), 0.0);
        assert_eq!(parse_score(&json!("cloudy afternoon"), "day"), 0.0);
        assert_eq!(parse_score(&json!(null), "day"), 0.0);
        assert_eq!(parse_score(&json!(3.5), "day"), 0.0);
    }

    #[test]
    fn string_valued_map_entries_parse_as_numbers() {
        assert_eq!(parse_score(&json!({"winter": "14.2"}), "winter"), 14.2);
    }
}
