use serde_json::Value;
use std::collections::HashMap;

/// Collapses consecutive whitespace runs to a single space and trims.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans a raw field value. A value that collapses to the empty string is
/// absent, not `Some("")` — the distinction feeds both identity hashing and
/// export field omission.
pub fn clean_field(input: &str) -> Option<String> {
    let cleaned = collapse_whitespace(input);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Coerces a raw JSON value to its canonical string representation.
///
/// Upstream transcription only ever hands us strings, integers, floats and
/// booleans; anything else is a bug in the caller and aborts instead of
/// stringifying garbage.
pub fn coerce_value(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                format!("{i}")
            } else {
                format!("{:.6}", n.as_f64().unwrap_or_default())
            }
        }
        Value::Bool(b) => format!("{b}"),
        other => panic!("unsupported raw field value: {other:?}"),
    }
}

/// Normalizes a raw source mapping: keys upper-cased for structural matching,
/// values coerced to strings with whitespace collapsed.
pub fn normalize_map(input: &serde_json::Map<String, Value>) -> HashMap<String, String> {
    input
        .iter()
        .map(|(key, value)| (key.to_uppercase(), collapse_whitespace(&coerce_value(value))))
        .collect()
}
