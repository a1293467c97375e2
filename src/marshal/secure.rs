//! Secure string marker.
//!
//! The server may reinterpret text that is not plain printable ASCII. Such
//! text is sent with a leading U+FEFF, which the server drops; text coming
//! back may carry one that the client removes.

use crate::codec::Value;

/// Marker prefixed to strings that are not plain printable ASCII.
pub const SECURE_MARKER: char = '\u{FEFF}';

/// Check if `s` must be prefixed before sending.
pub fn needs_marker(s: &str) -> bool {
    s.starts_with(SECURE_MARKER) || s.chars().any(|c| !(' '..='~').contains(&c))
}

/// Prefix the marker when needed.
pub fn secure(s: &str) -> String {
    if needs_marker(s) {
        let mut out = String::with_capacity(s.len() + SECURE_MARKER.len_utf8());
        out.push(SECURE_MARKER);
        out.push_str(s);
        out
    } else {
        s.to_string()
    }
}

/// Remove one leading marker, if present.
pub fn strip(s: &str) -> &str {
    s.strip_prefix(SECURE_MARKER).unwrap_or(s)
}

pub fn secure_all<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| secure(s.as_ref())).collect()
}

pub fn strip_all(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| match s.strip_prefix(SECURE_MARKER) {
            Some(rest) => rest.to_string(),
            None => s,
        })
        .collect()
}

/// Strip a string value, or every string inside an array value.
pub fn strip_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip(&s).to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_value).collect()),
        other => other,
    }
}
