//! Secret redaction for values, headers and JSON bodies.
//!
//! Redaction keeps just enough of a secret to tell two values apart in a
//! log line, and never enough to reuse it:
//!
//! | Length | Output                                   | Example (reveal 1)       |
//! |--------|------------------------------------------|--------------------------|
//! | 0      | empty                                    | `""` → `""`              |
//! | 1–4    | one `*` per character                    | `abc` → `***`            |
//! | 5–7    | `*{len-2}*`                              | `abcde` → `*3*`          |
//! | 8+     | first/last `reveal` chars around `[n]`   | `abcdefgh` → `a[6]h`     |
//!
//! `reveal` is clamped to `len / 8`, so at most a quarter of the value is ever
//! shown. Lengths count characters, not bytes.
//!
//! Header and body redaction apply [`redact_secret`] with a reveal of 6 to
//! every value whose name [`is_sensitive_key`].

use http::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};

/// Characters revealed at each end when redacting headers and bodies.
pub const DEFAULT_REVEAL: usize = 6;

const SENSITIVE_FRAGMENTS: &[&str] =
    &["authorization", "authorisation", "cookie", "password", "secret", "key", "token"];

/// Returns `true` if a header or field with this name holds a secret.
///
/// Matches any name containing `authorization`, `authorisation`, `cookie`,
/// `password`, `secret`, `key` or `token`, ignoring case.
///
/// ```rust
/// use o11y::redact::is_sensitive_key;
///
/// assert!(is_sensitive_key("Authorization"));
/// assert!(is_sensitive_key("x-api-key"));
/// assert!(!is_sensitive_key("content-type"));
/// ```
pub fn is_sensitive_key(name: &str) -> bool {
    let name = name.to_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}

/// Masks `value`, revealing up to `reveal` characters at each end.
///
/// ```rust
/// use o11y::redact::redact_secret;
///
/// assert_eq!(redact_secret("abcdefgh", 1), "a[6]h");
/// assert_eq!(redact_secret("kubes", 1), "*3*");
/// assert_eq!(redact_secret("internationalisation", 1), "i[18]n");
/// ```
pub fn redact_secret(value: &str, reveal: usize) -> String {
    let len = value.chars().count();
    let reveal = reveal.min(len / 8);

    match len {
        0 => String::new(),
        1..=4 => "*".repeat(len),
        _ if len < 8 || reveal == 0 => format!("*{}*", len - 2),
        _ => {
            let head: String = value.chars().take(reveal).collect();
            let tail: String = value.chars().skip(len - reveal).collect();
            format!("{head}[{}]{tail}", len - 2 * reveal)
        },
    }
}

/// Returns a copy of `headers` with every sensitive header's values redacted.
///
/// Value order and multiplicity are preserved; other headers pass through.
pub fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut redacted = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let value = if is_sensitive_key(name.as_str()) {
            let masked = redact_secret(&String::from_utf8_lossy(value.as_bytes()), DEFAULT_REVEAL);
            // A masked value is a subset of the original characters plus ASCII.
            HeaderValue::from_str(&masked).unwrap_or_else(|_| HeaderValue::from_static("[redacted]"))
        } else {
            value.clone()
        };
        redacted.append(name.clone(), value);
    }
    redacted
}

/// Redacts sensitive fields in a JSON object body.
///
/// Anything that does not parse as a JSON object is returned unchanged. For
/// each key at every object level, a sensitive key has its value replaced
/// by the redacted string form of that value, and a non-sensitive key holding
/// an object is walked recursively. Arrays are not walked. The output is
/// re-serialized with keys in sorted order.
///
/// ```rust
/// use o11y::redact::redact_body;
///
/// let body = br#"{"user":"alice","password":"correct-horse-battery"}"#;
/// let redacted = redact_body(body);
/// assert_eq!(redacted, br#"{"password":"co[17]ry","user":"alice"}"#);
/// ```
pub fn redact_body(body: &[u8]) -> Vec<u8> {
    let Ok(Value::Object(mut object)) = serde_json::from_slice::<Value>(body) else {
        return body.to_vec();
    };
    redact_object(&mut object);
    serde_json::to_vec(&sorted(Value::Object(object))).unwrap_or_else(|_| body.to_vec())
}

fn redact_object(object: &mut Map<String, Value>) {
    for (key, value) in object.iter_mut() {
        if is_sensitive_key(key) {
            let text = match &mut *value {
                Value::String(s) => std::mem::take(s),
                other => other.to_string(),
            };
            *value = Value::String(redact_secret(&text, DEFAULT_REVEAL));
        } else if let Value::Object(nested) = value {
            redact_object(nested);
        }
    }
}

// serde_json keeps insertion order once `preserve_order` is enabled anywhere in
// the dependency graph; sort explicitly so output never depends on that.
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(String, Value)> = object.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        },
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Renders headers as a JSON object of name to list of values.
///
/// Non-UTF-8 values are converted lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut object = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        object.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(object)
}
