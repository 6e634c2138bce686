//! Trailing Queue: work deferred until the current commit pass finishes.
//!
//! Observers queue trailing calls and trailing commit data through the
//! [`Trailing`] capability. After every observer of the pass has run, each
//! distinct call fires once (at the position of its last occurrence) and the
//! accumulated data becomes the next commit pass.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::value::{into_property_map, merge, PropertyMap, ValueStore};

/// A deferred callback. Clones share identity; deduplication compares identity,
/// never behaviour.
#[derive(Clone)]
pub struct TrailingCall {
    call: Rc<dyn Fn() -> anyhow::Result<()>>,
}

impl TrailingCall {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        Self {
            call: Rc::new(call),
        }
    }

    /// Whether both handles refer to the same callback.
    pub fn same(&self, other: &TrailingCall) -> bool {
        self.key() == other.key()
    }

    pub(crate) fn invoke(&self) -> anyhow::Result<()> {
        (self.call)()
    }

    fn key(&self) -> *const () {
        Rc::as_ptr(&self.call).cast::<()>()
    }
}

impl fmt::Debug for TrailingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrailingCall").field(&self.key()).finish()
    }
}

/// Values accepted as trailing calls: nothing, one call, an optional call, or
/// a list. `None` entries are skipped.
pub trait IntoTrailingCalls {
    fn into_trailing_calls(self) -> Vec<TrailingCall>;
}

impl IntoTrailingCalls for () {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        Vec::new()
    }
}

impl IntoTrailingCalls for TrailingCall {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        vec![self]
    }
}

impl IntoTrailingCalls for &TrailingCall {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        vec![self.clone()]
    }
}

impl IntoTrailingCalls for Option<TrailingCall> {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        self.into_iter().collect()
    }
}

impl IntoTrailingCalls for Vec<TrailingCall> {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        self
    }
}

impl IntoTrailingCalls for Vec<Option<TrailingCall>> {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        self.into_iter().flatten().collect()
    }
}

impl<const N: usize> IntoTrailingCalls for [TrailingCall; N] {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        self.into()
    }
}

impl IntoTrailingCalls for &[TrailingCall] {
    fn into_trailing_calls(self) -> Vec<TrailingCall> {
        self.to_vec()
    }
}

/// Calls and data queued during one commit pass.
#[derive(Debug, Default)]
pub(crate) struct TrailingQueue {
    calls: Vec<TrailingCall>,
    data: PropertyMap,
}

impl TrailingQueue {
    pub(crate) fn push_calls(&mut self, calls: impl IntoTrailingCalls) {
        self.calls.extend(calls.into_trailing_calls());
    }

    /// Shallow-merge `data` into the pending trailing commit; later keys win.
    pub(crate) fn merge_data(&mut self, data: &PropertyMap) {
        merge(&mut self.data, data);
    }

    /// Calls that survive deduplication: for every distinct callback only its
    /// last occurrence, in queue order.
    pub(crate) fn resolved_calls(&self) -> Vec<TrailingCall> {
        let last: HashMap<*const (), usize> = self
            .calls
            .iter()
            .enumerate()
            .map(|(index, call)| (call.key(), index))
            .collect();
        self.calls
            .iter()
            .enumerate()
            .filter(|(index, call)| last.get(&call.key()) == Some(index))
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Consume the queue, returning the deduplicated calls and the trailing data.
    pub(crate) fn into_parts(self) -> (Vec<TrailingCall>, PropertyMap) {
        let calls = self.resolved_calls();
        (calls, self.data)
    }
}

/// Capability handed to an observer for the duration of one invocation.
pub struct Trailing<'a> {
    queue: &'a mut TrailingQueue,
    values: &'a ValueStore,
}

impl<'a> Trailing<'a> {
    pub(crate) fn new(queue: &'a mut TrailingQueue, values: &'a ValueStore) -> Self {
        Self { queue, values }
    }

    /// Queue callbacks to run once this commit pass has dispatched every observer.
    pub fn call(&mut self, calls: impl IntoTrailingCalls) {
        self.queue.push_calls(calls);
    }

    /// Queue data for the commit that follows this pass.
    pub fn commit(&mut self, data: PropertyMap) {
        self.queue.merge_data(&data);
    }

    /// Queue a JSON object for the commit that follows this pass.
    /// Non-object values are ignored.
    pub fn commit_json(&mut self, data: Value) {
        if let Some(data) = into_property_map(data) {
            self.queue.merge_data(&data);
        }
    }

    /// Current stored value of any property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> TrailingCall {
        let log = log.clone();
        TrailingCall::new(move || {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn clones_share_identity() {
        let f = TrailingCall::new(|| Ok(()));
        let g = TrailingCall::new(|| Ok(()));

        assert!(f.same(&f.clone()));
        assert!(!f.same(&g));
    }

    #[test]
    fn only_last_occurrence_survives() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let success = recorder(&log, "success");
        let time = recorder(&log, "time");

        let mut queue = TrailingQueue::default();
        queue.push_calls(vec![success.clone(), time.clone()]);
        queue.push_calls(&success);
        queue.push_calls(&success);
        queue.push_calls(&success);
        queue.push_calls(&time);

        let calls = queue.resolved_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].same(&success));
        assert!(calls[1].same(&time));

        for call in &calls {
            call.invoke().unwrap();
        }
        assert_eq!(*log.borrow(), vec!["success", "time"]);
    }

    #[test]
    fn none_entries_are_skipped() {
        let mut queue = TrailingQueue::default();
        queue.push_calls(None::<TrailingCall>);
        queue.push_calls(vec![None, Some(TrailingCall::new(|| Ok(())))]);
        queue.push_calls(());

        assert_eq!(queue.resolved_calls().len(), 1);
    }

    #[test]
    fn trailing_data_is_last_write_wins() {
        let values = ValueStore::new();
        let mut queue = TrailingQueue::default();
        {
            let mut trailing = Trailing::new(&mut queue, &values);
            trailing.commit_json(json!({"x": 1, "y": 1}));
            trailing.commit_json(json!({"x": 5}));
            trailing.commit_json(json!(42));
        }

        let (calls, data) = queue.into_parts();
        assert!(calls.is_empty());
        assert_eq!(data, into_property_map(json!({"x": 5, "y": 1})).unwrap());
    }
}
