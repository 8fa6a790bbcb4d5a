//! Generic document model
//!
//! Every backend speaks in terms of [`Document`]: an ordered mapping from
//! string keys to dynamically typed [`Value`]s. Records are converted into
//! documents on the way out and rebuilt from documents on the way back.

use std::cmp::Ordering;
use std::fmt;

/// A dynamically typed value stored in a [`Document`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Document),
}

impl Value {
    /// Short name of the runtime type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Map(d) => Some(d),
            _ => None,
        }
    }

    /// Order two values of compatible types.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// unrelated types are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality that treats `1` and `1.0` as the same value
    pub fn loosely_equals(&self, other: &Value) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return self.compare(other) == Some(Ordering::Equal);
        }
        self == other
    }

    /// Convert into a JSON value. Bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(doc) => doc.to_json(),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

/// Ordered key/value document.
///
/// Insertion order is preserved. Inserting an existing key replaces its value
/// without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous value for the key if any
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Look up a dotted path such as `addr.city` through nested maps
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_document()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a dotted path, creating intermediate maps as needed.
    ///
    /// Fails with the offending segment when an intermediate value exists and
    /// is not a map.
    pub fn set_path(&mut self, path: &str, value: Value) -> std::result::Result<(), String> {
        match path.split_once('.') {
            None => {
                self.insert(path, value);
                Ok(())
            }
            Some((head, rest)) => {
                if self.get(head).is_none_or(Value::is_null) {
                    self.insert(head, Document::new());
                }
                match self.get_mut(head) {
                    Some(Value::Map(inner)) => inner.set_path(rest, value),
                    _ => Err(head.to_string()),
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        doc.extend(iter);
        doc
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Document {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Build a [`Document`] from `key => value` pairs.
///
/// ```
/// use polystore::doc;
///
/// let user = doc! { "username" => "sammwy", "age" => 23 };
/// assert_eq!(user.len(), 2);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut document = $crate::Document::new();
        $( document.insert($key, $crate::Value::from($value)); )+
        document
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut d = doc! { "a" => 1, "b" => 2 };
        let previous = d.insert("a", 10);

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(d.get("a"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_path_access() {
        let mut d = doc! { "addr" => doc! { "city" => "x" } };
        assert_eq!(d.get_path("addr.city"), Some(&Value::from("x")));
        assert_eq!(d.get_path("addr.zip"), None);

        d.set_path("addr.zip", Value::from("1000")).unwrap();
        d.set_path("meta.tags", Value::from(vec!["a"])).unwrap();
        assert_eq!(d.get_path("addr.zip"), Some(&Value::from("1000")));
        assert!(d.get_path("meta.tags").is_some());

        let mut scalar = doc! { "n" => 1 };
        assert_eq!(scalar.set_path("n.deep", Value::Null), Err("n".to_string()));
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        assert!(Value::Int(1).loosely_equals(&Value::Float(1.0)));
        assert_eq!(Value::from("a").compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_json_conversion() {
        let d = doc! {
            "name" => "sam",
            "tags" => vec!["x", "y"],
            "nested" => doc! { "ok" => true },
        };
        let json = d.to_json();
        assert_eq!(json["tags"][1], "y");

        let back = Value::from_json(json);
        assert_eq!(back, Value::Map(d));
    }

    #[test]
    fn test_remove() {
        let mut d = doc! { "a" => 1, "b" => 2, "c" => 3 };
        assert_eq!(d.remove("b"), Some(Value::Int(2)));
        assert_eq!(d.remove("b"), None);
        assert_eq!(d.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
