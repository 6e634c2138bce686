//! Dispatch Index and Observer Registry.
//!
//! The index maps a property to the observers watching it, in subscription
//! order. The registry owns each observer's callback and its declared
//! property list.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use crate::projection::Projection;
use crate::trailing::{Trailing, TrailingCall};
use crate::value::PropertyMap;

/// Identifier handed out by `watch`. Monotonically increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type ObserverFn =
    Box<dyn FnMut(&Projection, &Projection, &mut Trailing<'_>) -> anyhow::Result<Vec<TrailingCall>>>;

/// Anything accepted as the property list of `watch` or `computed`:
/// a single name or a list of names.
pub trait IntoWatchList {
    fn into_watch_list(self) -> Vec<String>;
}

impl IntoWatchList for &str {
    fn into_watch_list(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoWatchList for String {
    fn into_watch_list(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoWatchList for &[&str] {
    fn into_watch_list(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoWatchList for [&str; N] {
    fn into_watch_list(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoWatchList for Vec<&str> {
    fn into_watch_list(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoWatchList for Vec<String> {
    fn into_watch_list(self) -> Vec<String> {
        self
    }
}

impl IntoWatchList for &[String] {
    fn into_watch_list(self) -> Vec<String> {
        self.to_vec()
    }
}

// ---------------------------------------------------------------------------
// DispatchIndex
// ---------------------------------------------------------------------------

/// Property name → observers watching it, in subscription order.
#[derive(Debug, Default)]
pub(crate) struct DispatchIndex {
    entries: HashMap<String, Vec<ObserverId>>,
}

impl DispatchIndex {
    pub(crate) fn subscribe(&mut self, property: &str, id: ObserverId) {
        let entry = self.entries.entry(property.to_string()).or_default();
        if !entry.contains(&id) {
            entry.push(id);
        }
    }

    pub(crate) fn observers_of(&self, property: &str) -> &[ObserverId] {
        self.entries.get(property).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// ObserverRegistry
// ---------------------------------------------------------------------------

pub(crate) struct Registration {
    pub(crate) props: Vec<String>,
    pub(crate) callback: ObserverFn,
}

/// Observers by id. There is no unregister.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    last_id: u64,
    observers: BTreeMap<ObserverId, Registration>,
}

impl ObserverRegistry {
    pub(crate) fn register(&mut self, props: Vec<String>, callback: ObserverFn) -> ObserverId {
        self.last_id += 1;
        let id = ObserverId(self.last_id);
        self.observers.insert(id, Registration { props, callback });
        id
    }

    pub(crate) fn get_mut(&mut self, id: ObserverId) -> Option<&mut Registration> {
        self.observers.get_mut(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

// ---------------------------------------------------------------------------
// Dispatches
// ---------------------------------------------------------------------------

/// Changes of one commit pass grouped per observer.
///
/// Observers are ordered by the first changed property that reached them.
#[derive(Debug, Default)]
pub(crate) struct Dispatches {
    positions: HashMap<ObserverId, usize>,
    groups: Vec<(ObserverId, PropertyMap)>,
}

impl Dispatches {
    pub(crate) fn record(&mut self, id: ObserverId, property: &str, value: &Value) {
        let position = *self.positions.entry(id).or_insert_with(|| {
            self.groups.push((id, PropertyMap::new()));
            self.groups.len() - 1
        });
        self.groups[position]
            .1
            .insert(property.to_string(), value.clone());
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn into_groups(self) -> Vec<(ObserverId, PropertyMap)> {
        self.groups
    }
}
