//! The commit loop.

use std::fmt;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::computation::ComputationRegistry;
use crate::config::StoreConfig;
use crate::dispatch::{DispatchIndex, Dispatches, IntoWatchList, ObserverId, ObserverRegistry};
use crate::error::{Result, StoreError};
use crate::projection::{PriorValues, Projection};
use crate::trailing::{IntoTrailingCalls, Trailing, TrailingCall, TrailingQueue};
use crate::value::{into_property_map, merge, PropertyMap, ValueStore};

/// Create a fresh, independent store.
pub fn create_store() -> Store {
    Store::new()
}

/// Batched, dependency-aware property store.
///
/// Derive → diff → dispatch → trailing calls → trailing commit, until settled.
/// Every stage of a `commit` runs before the call returns. Callbacks only see
/// the [`Trailing`] capability, never the store, so a commit cannot be
/// re-entered from inside one.
#[derive(Default)]
pub struct Store {
    values: ValueStore,
    computations: ComputationRegistry,
    index: DispatchIndex,
    observers: ObserverRegistry,
    config: StoreConfig,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("properties", &self.values.len())
            .field("observers", &self.observers.len())
            .field("rules", &self.computations.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What one commit pass did.
#[derive(Debug, Default)]
struct PassOutcome {
    changed: usize,
    notified: usize,
    trailing_calls: usize,
    trailing_data: PropertyMap,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register an observer for one or more properties.
    ///
    /// The callback runs at most once per commit pass in which any of `props`
    /// changed. Whatever it returns is queued as trailing calls.
    pub fn watch<F, R>(&mut self, props: impl IntoWatchList, mut callback: F) -> ObserverId
    where
        F: FnMut(&Projection, &Projection, &mut Trailing<'_>) -> anyhow::Result<R> + 'static,
        R: IntoTrailingCalls,
    {
        let props = props.into_watch_list();
        let id = self.observers.register(
            props.clone(),
            Box::new(
                move |new_val: &Projection,
                      old_val: &Projection,
                      trailing: &mut Trailing<'_>|
                      -> anyhow::Result<Vec<TrailingCall>> {
                    Ok(callback(new_val, old_val, trailing)?.into_trailing_calls())
                },
            ),
        );
        for prop in &props {
            self.index.subscribe(prop, id);
        }
        debug!(observer = %id, props = ?props, "Observer registered");
        id
    }

    /// Register (or replace) the derive-from rule for `computed`.
    ///
    /// The rule only fires when one of `sources` is committed, or derived by an
    /// earlier rule, with a new value, and `computed` itself was not committed.
    pub fn computed<F>(&mut self, computed: &str, sources: impl IntoWatchList, derive: F) -> &mut Self
    where
        F: Fn(&PropertyMap) -> anyhow::Result<Value> + 'static,
    {
        self.computations
            .register_derive_from(computed, sources.into_watch_list(), Box::new(derive));
        self
    }

    /// Register (or replace) the derive-to rule triggered by `trigger`.
    pub fn computing<F>(&mut self, trigger: &str, derive: F) -> &mut Self
    where
        F: Fn(&PropertyMap) -> anyhow::Result<Option<PropertyMap>> + 'static,
    {
        self.computations.register_derive_to(trigger, Box::new(derive));
        self
    }

    /// Commit `data` as one batch, then settle every trailing commit it causes.
    ///
    /// Empty data is a no-op. Any callback error aborts the pass in progress.
    pub fn commit(&mut self, data: PropertyMap) -> Result<&mut Self> {
        let mut pending = data;
        let mut pass = 0usize;

        while !pending.is_empty() {
            if pass > 0 {
                if let Some(limit) = self.config.max_trailing_passes {
                    if pass > limit {
                        warn!(limit, "Trailing commits did not settle");
                        return Err(StoreError::TrailingPassLimit { limit });
                    }
                }
            }

            let outcome = self.run_pass(pending)?;
            debug!(
                pass,
                changed = outcome.changed,
                observers = outcome.notified,
                trailing_calls = outcome.trailing_calls,
                trailing_data = outcome.trailing_data.len(),
                "Commit pass applied"
            );
            pending = outcome.trailing_data;
            pass += 1;
        }

        if pass == 0 {
            trace!("Empty commit ignored");
        }
        Ok(self)
    }

    /// Commit the result of `data_fn` applied to the current snapshot.
    /// `None` or an empty map is a no-op.
    pub fn commit_with<F, D>(&mut self, data_fn: F) -> Result<&mut Self>
    where
        F: FnOnce(&PropertyMap) -> D,
        D: Into<Option<PropertyMap>>,
    {
        let data: Option<PropertyMap> = data_fn(self.values.as_map()).into();
        match data {
            Some(data) => self.commit(data),
            None => Ok(self),
        }
    }

    /// Commit a JSON object. Any other JSON value is a no-op.
    pub fn commit_json(&mut self, data: Value) -> Result<&mut Self> {
        match into_property_map(data) {
            Some(data) => self.commit(data),
            None => {
                trace!("Non-object commit ignored");
                Ok(self)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains(name)
    }

    /// Clone of every stored property, in first-commit order.
    pub fn snapshot(&self) -> PropertyMap {
        self.values.snapshot()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn rule_count(&self) -> usize {
        self.computations.len()
    }

    /// One pass: derive, diff against the store, notify observers once each,
    /// run deduplicated trailing calls. Returns the trailing commit data.
    fn run_pass(&mut self, data: PropertyMap) -> Result<PassOutcome> {
        // 1. Derive computed properties
        let derived = self.computations.evaluate(&data, &self.values)?;
        let mut data = data;
        merge(&mut data, &derived);

        // 2. Diff and apply, grouping changes per observer
        let mut previous = PriorValues::new();
        let mut dispatches = Dispatches::default();
        for (key, value) in data {
            if !self.values.differs(&key, &value) {
                continue;
            }
            for id in self.index.observers_of(&key) {
                dispatches.record(*id, &key, &value);
            }
            let prior = self.values.set(key.clone(), value);
            previous.insert(key, prior);
        }

        // 3. Notify each observer once
        let notified = dispatches.len();
        let mut queue = TrailingQueue::default();
        for (id, changes) in dispatches.into_groups() {
            let Some(registration) = self.observers.get_mut(id) else {
                continue;
            };
            let (new_val, old_val) =
                Projection::pair(&registration.props, &changes, &previous, &self.values);
            let mut trailing = Trailing::new(&mut queue, &self.values);
            let returned = (registration.callback)(&new_val, &old_val, &mut trailing)
                .map_err(|source| StoreError::Observer { id, source })?;
            queue.push_calls(returned);
        }

        // 4. Trailing calls, last occurrence of each
        let (calls, trailing_data) = queue.into_parts();
        for call in &calls {
            call.invoke()
                .map_err(|source| StoreError::TrailingCall { source })?;
        }

        Ok(PassOutcome {
            changed: previous.len(),
            notified,
            trailing_calls: calls.len(),
            trailing_data,
        })
    }
}
