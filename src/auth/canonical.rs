//! Canonical request bodies: the exact bytes that are hashed, signed and sent.
//!
//! Objects are written with their keys in sorted order at every depth, so the
//! same logical request always produces the same bytes no matter how its
//! variables were assembled. Transports transmit the encoded buffer as-is.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BuxError;

/// Ordered GraphQL variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and store it under `name`, replacing any previous value.
    ///
    /// Fails when `value` has no JSON representation (e.g. a map with
    /// non-string keys).
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), BuxError> {
        let value = canonicalize(serde_json::to_value(value)?);
        self.0.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize)]
struct GraphQlBody<'a> {
    query: &'a str,
    variables: &'a Variables,
}

/// An encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBody(String);

impl CanonicalBody {
    /// `{"query":<query>,"variables":{...}}` for a GraphQL operation.
    pub fn encode(query: &str, variables: &Variables) -> Result<Self, BuxError> {
        let body = GraphQlBody { query, variables };
        Ok(Self(serde_json::to_string(&body)?))
    }

    /// Any serializable value as a canonical JSON document (REST bodies).
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, BuxError> {
        let value = canonicalize(serde_json::to_value(value)?);
        Ok(Self(serde_json::to_string(&value)?))
    }

    /// The empty body of a GET request; it is signed as the empty string.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rebuild every object in `value` with its keys inserted in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const QUERY: &str = "query { transactions { id } }";

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut a = Variables::new();
        a.insert("metadata", &json!({"b": 2, "a": 1})).unwrap();
        a.insert("conditions", &json!({"fee": 5})).unwrap();

        let mut b = Variables::new();
        b.insert("conditions", &json!({"fee": 5})).unwrap();
        b.insert("metadata", &json!({"a": 1, "b": 2})).unwrap();

        let first = CanonicalBody::encode(QUERY, &a).unwrap();
        let second = CanonicalBody::encode(QUERY, &b).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_body_layout() {
        let mut vars = Variables::new();
        vars.insert("metadata", &json!({"z": true, "a": [ {"y": 1, "x": 2} ]}))
            .unwrap();
        let body = CanonicalBody::encode("q", &vars).unwrap();
        assert_eq!(
            body.as_str(),
            r#"{"query":"q","variables":{"metadata":{"a":[{"x":2,"y":1}],"z":true}}}"#
        );
    }

    #[test]
    fn test_empty_variables_encode_as_object() {
        let body = CanonicalBody::encode("q", &Variables::new()).unwrap();
        assert_eq!(body.as_str(), r#"{"query":"q","variables":{}}"#);
    }

    #[test]
    fn test_hash_map_input_is_sorted() {
        let mut map = HashMap::new();
        for key in ["delta", "alpha", "charlie", "bravo"] {
            map.insert(key.to_string(), key.len());
        }
        let body = CanonicalBody::from_value(&map).unwrap();
        assert_eq!(
            body.as_str(),
            r#"{"alpha":5,"bravo":5,"charlie":7,"delta":5}"#
        );
    }

    #[test]
    fn test_unserializable_value_fails() {
        let mut bad: HashMap<Vec<u8>, u8> = HashMap::new();
        bad.insert(vec![1, 2], 3);
        let mut vars = Variables::new();
        let err = vars.insert("metadata", &bad).unwrap_err();
        assert!(matches!(err, BuxError::Serde(_)));
        assert!(vars.is_empty());
    }

    #[test]
    fn test_query_is_escaped() {
        let body = CanonicalBody::encode("say \"hi\"\n", &Variables::new()).unwrap();
        assert_eq!(body.as_str(), r#"{"query":"say \"hi\"\n","variables":{}}"#);
    }

    #[test]
    fn test_empty_body() {
        let body = CanonicalBody::empty();
        assert!(body.is_empty());
        assert_eq!(body.as_str(), "");
    }
}
