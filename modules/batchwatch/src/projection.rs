//! The `newVal` / `oldVal` views handed to an observer.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::value::{PropertyMap, ValueStore};

/// Value each changed property held before the pass; `None` when it was unset.
pub(crate) type PriorValues = HashMap<String, Option<Value>>;

/// Values of exactly the properties an observer declared, in declaration order.
///
/// A watched property that was never set is present with an absent value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    entries: Vec<(String, Option<Value>)>,
}

impl Projection {
    /// Build the `(new, old)` pair for one observer.
    ///
    /// Properties in `changes` take their new value from `changes` and their old
    /// value from `previous`. Every other watched property reads the stored
    /// value on both sides.
    pub(crate) fn pair(
        props: &[String],
        changes: &PropertyMap,
        previous: &PriorValues,
        store: &ValueStore,
    ) -> (Projection, Projection) {
        let mut new_val = Projection::default();
        let mut old_val = Projection::default();
        for prop in props {
            match changes.get(prop) {
                Some(value) => {
                    new_val.insert(prop, Some(value.clone()));
                    old_val.insert(prop, previous.get(prop).cloned().flatten());
                }
                None => {
                    let stable = store.get(prop).cloned();
                    new_val.insert(prop, stable.clone());
                    old_val.insert(prop, stable);
                }
            }
        }
        (new_val, old_val)
    }

    fn insert(&mut self, name: &str, value: Option<Value>) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Value of `name`; `None` when unset or not watched.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Whether `name` is one of the watched properties.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializes as a JSON object; unset properties become `null`.
impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
