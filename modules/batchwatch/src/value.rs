//! Value Store: the last committed value of every property.
//!
//! Values are opaque JSON. A property is created by the first commit that
//! mentions it and is never removed.

use serde_json::{Map, Value};

/// Property name → value, iterated in insertion order.
pub type PropertyMap = Map<String, Value>;

/// Shallow merge: every entry of `from` overwrites the same key in `into`.
///
/// Keys already present in `into` keep their position; new keys are appended.
pub fn merge(into: &mut PropertyMap, from: &PropertyMap) {
    for (key, value) in from {
        into.insert(key.clone(), value.clone());
    }
}

/// Unwrap a JSON object into a `PropertyMap`. Any other JSON value yields `None`.
pub fn into_property_map(value: Value) -> Option<PropertyMap> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Strict equality of two property values.
///
/// Numbers compare by their `f64` value, so `1` and `1.0` are equal. Every
/// other value compares structurally.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Current snapshot of all committed properties.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    values: PropertyMap,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Whether `value` differs from the stored value of `name`.
    /// An unset property differs from every value, `null` included.
    pub fn differs(&self, name: &str, value: &Value) -> bool {
        !self
            .values
            .get(name)
            .is_some_and(|stored| strict_eq(stored, value))
    }

    /// Borrow the full snapshot.
    pub fn as_map(&self) -> &PropertyMap {
        &self.values
    }

    /// Clone the full snapshot.
    pub fn snapshot(&self) -> PropertyMap {
        self.values.clone()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Store `value`, returning the previous value if the property was set.
    pub(crate) fn set(&mut self, name: String, value: Value) -> Option<Value> {
        self.values.insert(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_and_keeps_position() {
        let mut into = into_property_map(json!({"a": 1, "b": 2})).unwrap();
        let from = into_property_map(json!({"b": 20, "c": 30})).unwrap();

        merge(&mut into, &from);

        let keys: Vec<&str> = into.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(into["b"], json!(20));
        assert_eq!(into["c"], json!(30));
    }

    #[test]
    fn non_object_json_is_not_a_property_map() {
        assert!(into_property_map(json!([1, 2])).is_none());
        assert!(into_property_map(json!("a")).is_none());
        assert!(into_property_map(Value::Null).is_none());
        assert!(into_property_map(json!({})).unwrap().is_empty());
    }

    #[test]
    fn unset_property_differs_from_null() {
        let mut store = ValueStore::new();
        assert!(store.differs("a", &Value::Null));

        assert_eq!(store.set("a".into(), Value::Null), None);
        assert!(!store.differs("a", &Value::Null));
        assert!(store.differs("a", &json!(0)));
    }

    #[test]
    fn integer_and_float_forms_of_a_number_are_equal() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(strict_eq(&json!(-4), &json!(-4.0)));
        assert!(!strict_eq(&json!(1), &json!(1.5)));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(strict_eq(&json!([1, 2]), &json!([1, 2])));

        let mut store = ValueStore::new();
        store.set("a".into(), json!(2));
        assert!(!store.differs("a", &json!(2.0)));
    }

    #[test]
    fn set_returns_previous_value() {
        let mut store = ValueStore::new();
        store.set("a".into(), json!(1));
        assert_eq!(store.set("a".into(), json!(2)), Some(json!(1)));
        assert_eq!(store.get("a"), Some(&json!(2)));
        assert_eq!(store.len(), 1);
    }
}
