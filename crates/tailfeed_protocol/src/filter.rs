//! Field predicates derived from query parameters.

use serde_json::{Map, Value};

/// Query parameters that control the request and never become predicates.
pub const RESERVED_PARAMS: [&str; 4] = ["limit", "sort", "offset", "resources"];

/// A set of field-match predicates.
///
/// Each non-reserved query parameter becomes one predicate. Dotted names
/// address nested fields: `brand.code=X` becomes `{"brand": {"code": "X"}}`.
///
/// An event passes when there are no predicates or when at least one
/// predicate matches its data. Multiple parameters are therefore OR-ed,
/// not AND-ed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    predicates: Vec<Value>,
}

impl FieldFilter {
    /// Builds a filter from query parameters, in request order.
    pub fn from_params<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let predicates = params
            .into_iter()
            .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| nest(key.as_ref(), Value::String(value.as_ref().to_string())))
            .collect();
        Self { predicates }
    }

    /// Returns the predicates.
    pub fn predicates(&self) -> &[Value] {
        &self.predicates
    }

    /// Returns true if there are no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns true if `data` should be delivered.
    ///
    /// Any single matching predicate is enough. This is deliberately not
    /// last-predicate-wins: with `name=A&code=C1`, data whose `name` is
    /// `"A"` passes even when `code` differs.
    pub fn passes(&self, data: &Value) -> bool {
        self.predicates.is_empty() || self.predicates.iter().any(|p| is_subset(p, data))
    }
}

/// Wraps `value` in one object level per dotted path segment.
fn nest(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, segment| {
        let mut obj = Map::new();
        obj.insert(segment.to_string(), inner);
        Value::Object(obj)
    })
}

/// Deep partial match: every field of `pattern` is present in `target`
/// with a matching value.
///
/// Objects match recursively on the pattern's keys. Arrays match when
/// every pattern element matches some target element. Everything else
/// compares by strict equality, so `"5"` does not match `5`.
pub fn is_subset(pattern: &Value, target: &Value) -> bool {
    match (pattern, target) {
        (Value::Object(p), Value::Object(t)) => p
            .iter()
            .all(|(key, pv)| t.get(key).is_some_and(|tv| is_subset(pv, tv))),
        (Value::Array(p), Value::Array(t)) => p
            .iter()
            .all(|pv| t.iter().any(|tv| is_subset(pv, tv))),
        _ => pattern == target,
    }
}
