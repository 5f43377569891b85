//! Values stored inside containers, and plain snapshots of whole subtrees.
//!
//! [`Value`] is what a map entry or list item holds: a scalar, or a
//! reference to a structural node owned by the same document. [`PlainValue`]
//! is the fully materialized, acyclic form used for serialization, UI
//! rendering and test assertions.

use std::{collections::BTreeMap, fmt};

use super::{node::NodeId, text::Annotation};

/// A value held by a map entry or list item.
///
/// # Value Types
///
/// ## Scalars
/// - [`Value::Null`] - an explicit null, distinct from an absent entry
/// - [`Value::Bool`] - boolean
/// - [`Value::Number`] - double precision number
/// - [`Value::String`] - UTF-8 string
///
/// ## Structural reference
/// - [`Value::Node`] - a map, list or text node of the same document
///
/// Scalars compare structurally. Node references compare by identity, so two
/// distinct maps with the same content are not equal as values.
///
/// ```
/// # use sharedoc::model::Value;
/// let v = Value::from("hello");
/// assert!(v == "hello");
/// assert!(Value::from(42) == 42.0);
/// assert!(!(Value::Null == false));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Node(NodeId),
}

impl Value {
    /// Returns true if this value references a structural node
    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    /// Returns true for an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Node(_) => "node",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            Value::Node(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Node(id) => write!(f, "<node {id}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<NodeId> for Value {
    fn from(value: NodeId) -> Self {
        Value::Node(value)
    }
}

impl From<&NodeId> for Value {
    fn from(value: &NodeId) -> Self {
        Value::Node(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        self.as_number() == Some(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl PartialEq<Value> for &str {
    fn eq(&self, other: &Value) -> bool {
        other == *self
    }
}

/// A deep, reference-free snapshot of a value or subtree.
///
/// Maps compare without regard to insertion order, which makes snapshots
/// suitable for deep-equality assertions against hand-built structures.
///
/// ```
/// # use sharedoc::model::PlainValue;
/// let plain = PlainValue::from(serde_json::json!({"a": [1, "x"], "b": null}));
/// assert_eq!(plain.to_json(), serde_json::json!({"b": null, "a": [1.0, "x"]}));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PlainValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, PlainValue>),
    List(Vec<PlainValue>),
    Text {
        text: String,
        annotations: Vec<Annotation>,
    },
}

impl PlainValue {
    /// Builds a plain map from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<PlainValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        PlainValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a plain list.
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<PlainValue>,
        I: IntoIterator<Item = V>,
    {
        PlainValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Plain text without annotations.
    pub fn text(text: impl Into<String>) -> Self {
        PlainValue::Text {
            text: text.into(),
            annotations: Vec::new(),
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PlainValue>> {
        match self {
            PlainValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PlainValue]> {
        match self {
            PlainValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlainValue::String(s) => Some(s),
            PlainValue::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Converts the snapshot into JSON.
    ///
    /// Text without annotations becomes a JSON string; annotated text becomes
    /// an object with `text` and `annotations` fields.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            PlainValue::Null => Json::Null,
            PlainValue::Bool(b) => Json::Bool(*b),
            PlainValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            PlainValue::String(s) => Json::String(s.clone()),
            PlainValue::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            PlainValue::List(items) => Json::Array(items.iter().map(PlainValue::to_json).collect()),
            PlainValue::Text { text, annotations } if annotations.is_empty() => {
                Json::String(text.clone())
            }
            PlainValue::Text { text, annotations } => serde_json::json!({
                "text": text,
                "annotations": annotations,
            }),
        }
    }
}

impl From<serde_json::Value> for PlainValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => PlainValue::Null,
            Json::Bool(b) => PlainValue::Bool(b),
            Json::Number(n) => PlainValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => PlainValue::String(s),
            Json::Array(items) => PlainValue::List(items.into_iter().map(Into::into).collect()),
            Json::Object(map) => {
                PlainValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for PlainValue {
    fn from(value: &str) -> Self {
        PlainValue::String(value.to_string())
    }
}

impl From<String> for PlainValue {
    fn from(value: String) -> Self {
        PlainValue::String(value)
    }
}

impl From<f64> for PlainValue {
    fn from(value: f64) -> Self {
        PlainValue::Number(value)
    }
}

impl From<i32> for PlainValue {
    fn from(value: i32) -> Self {
        PlainValue::Number(value as f64)
    }
}

impl From<bool> for PlainValue {
    fn from(value: bool) -> Self {
        PlainValue::Bool(value)
    }
}
