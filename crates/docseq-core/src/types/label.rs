use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Terminal value inside a structured label.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Free text.
    Text(String),
    /// Integer or floating point number. Integers outside the `i64`/`u64`
    /// range are held as `f64`.
    Number(Number),
    /// Boolean flag.
    Bool(bool),
    /// JSON `null`.
    Null,
}

/// Renders the scalar the way it appears inside a token sequence.
///
/// Booleans and `null` use the `True` / `False` / `None` spelling so that
/// sequences match those already present in Donut-style datasets.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(num) => write!(f, "{num}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Null => f.write_str("None"),
        }
    }
}

/// Nested ground truth for one training image.
///
/// Mappings keep their insertion order; key ordering for encoding is
/// decided by the encoder, not by the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Label {
    /// String keys to nested labels, in source order.
    Mapping(Vec<(String, Label)>),
    /// Ordered list of nested labels.
    Sequence(Vec<Label>),
    /// A terminal value.
    Scalar(Scalar),
}

impl Label {
    /// Creates a text scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    /// Creates a mapping from `(key, value)` pairs, keeping their order.
    #[must_use]
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Label)>,
    {
        Self::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates a sequence.
    #[must_use]
    pub fn sequence(items: impl IntoIterator<Item = Label>) -> Self {
        Self::Sequence(items.into_iter().collect())
    }

    /// Parses a JSON document into a label.
    pub fn from_json_str(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Value>(input).map(Self::from)
    }

    /// Looks up a key in a mapping label.
    pub fn get(&self, key: &str) -> Option<&Label> {
        match self {
            Self::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Converts the label back into a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for Label {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::String(text) => Self::Scalar(Scalar::Text(text)),
            Value::Number(num) => Self::Scalar(Scalar::Number(num)),
            Value::Bool(flag) => Self::Scalar(Scalar::Bool(flag)),
            Value::Null => Self::Scalar(Scalar::Null),
        }
    }
}

impl From<Label> for Value {
    fn from(label: Label) -> Self {
        match label {
            Label::Mapping(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key, value.into());
                }
                Value::Object(map)
            }
            Label::Sequence(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Label::Scalar(Scalar::Text(text)) => Value::String(text),
            Label::Scalar(Scalar::Number(num)) => Value::Number(num),
            Label::Scalar(Scalar::Bool(flag)) => Value::Bool(flag),
            Label::Scalar(Scalar::Null) => Value::Null,
        }
    }
}
