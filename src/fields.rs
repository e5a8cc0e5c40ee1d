//! Structured key/value fields attached to log records.
//!
//! [`Fields`] is an ordered set of unique keys. Two rules govern duplicates:
//!
//! - **Building** a set from raw input ([`Fields::from_tokens`],
//!   [`FromIterator`], [`fields!`](crate::fields!)) keeps the *first*
//!   occurrence of a key and drops later ones.
//! - **Merging** newer fields into an accumulated set ([`Fields::insert`],
//!   [`Fields::merge`]) keeps the key where it first appeared but takes the
//!   *newer* value. This is how an Observer's stable fields evolve and how
//!   call-site fields override them for a single record.
//!
//! ## Example
//!
//! ```rust
//! use o11y::{fields, Fields};
//!
//! let stable = fields!["request_id" => "abc", "user" => "alice"];
//! let record = stable.merge(&fields!["user" => "bob", "attempt" => 2]);
//!
//! let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
//! assert_eq!(keys, ["request_id", "user", "attempt"]);
//! assert_eq!(record.get("user"), Some(&serde_json::json!("bob")));
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::tracing_support::SpanValue;

/// An ordered set of uniquely keyed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    /// Creates an empty set.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds fields from alternating key/value tokens.
    ///
    /// String keys are used verbatim, other keys as their JSON text. A trailing
    /// key with no value is dropped. For repeated keys the first wins.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use o11y::Fields;
    ///
    /// let fields = Fields::from_tokens([json!("a"), json!(1), json!("a"), json!(2), json!("b")]);
    /// assert_eq!(fields.len(), 1);
    /// assert_eq!(fields.get("a"), Some(&json!(1)));
    /// ```
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut fields = Fields::new();
        let mut tokens = tokens.into_iter();
        while let (Some(key), Some(value)) = (tokens.next(), tokens.next()) {
            fields.insert_if_absent(token_key(key), value);
        }
        fields
    }

    /// Flattens back into alternating key/value tokens.
    pub fn to_tokens(&self) -> Vec<Value> {
        self.0
            .iter()
            .flat_map(|(k, v)| [Value::String(k.clone()), v.clone()])
            .collect()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sets `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    fn insert_if_absent(&mut self, key: String, value: Value) {
        if !self.contains_key(&key) {
            self.0.push((key, value));
        }
    }

    /// Returns `self` updated with every field of `newer`.
    ///
    /// Keys already present keep their position and take the newer value; new
    /// keys are appended in `newer`'s order.
    #[must_use]
    pub fn merge(&self, newer: &Fields) -> Fields {
        let mut merged = self.clone();
        merged.extend_from(newer);
        merged
    }

    /// In-place form of [`merge`](Self::merge).
    pub fn extend_from(&mut self, newer: &Fields) {
        for (key, value) in &newer.0 {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Converts to span attributes.
    pub fn to_span_attributes(&self) -> Vec<(String, SpanValue)> {
        self.0.iter().map(|(k, v)| (k.clone(), SpanValue::from(v))).collect()
    }
}

fn token_key(token: Value) -> String {
    match token {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Removes repeated keys from alternating key/value tokens.
///
/// The first occurrence of a key wins and a trailing key with no value is
/// dropped. Applying it twice gives the same result as applying it once.
pub fn dedupe_tokens<I>(tokens: I) -> Vec<Value>
where
    I: IntoIterator<Item = Value>,
{
    Fields::from_tokens(tokens).to_tokens()
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert_if_absent(key.into(), value.into());
        }
        fields
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = &'a (String, Value);
    type IntoIter = std::slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Builds [`Fields`] from `key => value` pairs; the first occurrence of a key wins.
///
/// ```rust
/// let fields = o11y::fields!["user" => "alice", "attempt" => 3];
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        <$crate::Fields as ::std::iter::FromIterator<(::std::string::String, $crate::__private::Value)>>::from_iter([
            $((::std::string::String::from($key), $crate::__private::Value::from($value))),+
        ])
    };
}

/// Standard field names.
pub mod names {
    /// Inbound request id.
    pub const REQUEST_ID: &str = "request_id";
    /// Inbound request method.
    pub const REQUEST_METHOD: &str = "request_method";
    /// Inbound request path.
    pub const REQUEST_PATH: &str = "request_path";
    /// Outbound request headers.
    pub const REQUEST_HEADERS: &str = "request_headers";
    /// Outbound request URL.
    pub const REQUEST_URL: &str = "request_url";
    /// Outbound request body.
    pub const REQUEST_BODY: &str = "request_body";
    /// Outbound response headers.
    pub const RESPONSE_HEADERS: &str = "response_headers";
    /// Outbound response body.
    pub const RESPONSE_BODY: &str = "response_body";
    /// Outbound call duration in milliseconds.
    pub const CALL_DURATION: &str = "call_duration";
    /// Response status code.
    pub const STATUS_CODE: &str = "status_code";
    /// Current span id.
    pub const SPAN_ID: &str = "span_id";
    /// Current trace id.
    pub const TRACE_ID: &str = "trace_id";
    /// Trace id received from the caller.
    pub const REMOTE_TRACE_ID: &str = "remote_trace_id";
    /// Span id received from the caller.
    pub const REMOTE_SPAN_ID: &str = "remote_span_id";
    /// Deployment environment.
    pub const ENVIRONMENT: &str = "environment";
    /// Inbound request origin.
    pub const ORIGIN: &str = "origin";
    /// Error message on error records.
    pub const ERROR: &str = "error";
    /// Error severity on error records.
    pub const SEVERITY: &str = "severity";
}
