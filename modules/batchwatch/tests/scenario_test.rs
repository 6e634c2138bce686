//! End-to-end scenario: a trailing commit feeds a cascade of computed
//! properties whose registration order decides which of them fire.

use std::cell::Cell;
use std::rc::Rc;

use batchwatch::{create_store, into_property_map, TrailingCall};
use serde_json::{json, Value};

/// Asserts the step counter is at `expected`, then advances it.
fn step(counter: &Cell<u32>, expected: u32) {
    assert_eq!(counter.get(), expected, "callbacks ran out of order");
    counter.set(counter.get() + 1);
}

#[test]
fn cascade_through_trailing_commit_and_computed_properties() {
    let mut store = create_store();
    let i = Rc::new(Cell::new(0u32));
    let success_runs = Rc::new(Cell::new(0u32));
    let time_runs = Rc::new(Cell::new(0u32));

    let success = {
        let i = i.clone();
        let runs = success_runs.clone();
        TrailingCall::new(move || {
            assert_eq!(i.get(), 6);
            runs.set(runs.get() + 1);
            Ok(())
        })
    };
    let time = {
        let runs = time_runs.clone();
        TrailingCall::new(move || {
            runs.set(runs.get() + 1);
            Ok(())
        })
    };

    {
        let i = i.clone();
        store.watch("a", move |new_val, old_val, t| {
            step(&i, 0);
            assert_eq!(old_val.get("a"), None);
            assert_eq!(new_val.get("a"), Some(&json!(1)));
            t.commit_json(json!({"b": -1}));
            Ok(())
        });
    }

    {
        let i = i.clone();
        store.watch("A", move |new_val, old_val, _| {
            step(&i, 1);
            // Only watched properties are projected.
            assert!(!new_val.contains("a"));
            assert_eq!(new_val.get("a"), None);
            assert_eq!(old_val.get("a"), None);
            assert_eq!(new_val.get("A"), Some(&json!("A")));
            Ok(())
        });
    }

    {
        let i = i.clone();
        store.watch("b", move |new_val, old_val, t| {
            step(&i, 5);
            assert_eq!(new_val.get("a"), None);
            assert_eq!(t.get("a"), Some(&json!(1)));
            assert_eq!(new_val.get("c"), None);
            assert_eq!(t.get("c"), Some(&json!(-2)));
            assert_eq!(old_val.get("b"), None);
            assert_eq!(new_val.get("b"), Some(&json!(-1)));
            assert_eq!(t.get("b"), Some(&json!(-1)));
            t.call(vec![success.clone(), time.clone()]);
            t.call(&success);
            t.call(&success);
            t.call(&success);
            t.call(&time);
            Ok(())
        });
    }

    {
        let i = i.clone();
        // Depends on `c`, which is only computed by a rule registered later.
        store.computed("FailedDependentOnCBeforeC", ["c"], move |_| {
            i.set(i.get() + 100);
            Ok(json!("never computed"))
        });
    }

    {
        let i = i.clone();
        store.computed("c", ["b"], move |v| {
            step(&i, 2);
            Ok(json!(v.get("b").and_then(Value::as_i64).unwrap_or(0) * 2))
        });
    }

    store.computed(
        "onlyCommitIsValidIfDefinedPreviously",
        ["SuccessDependentOnC"],
        |v| {
            let dependency = v.get("SuccessDependentOnC").cloned().unwrap_or(Value::Null);
            Ok(json!(format!("SuccessDependentOnC is {dependency}")))
        },
    );

    {
        let i = i.clone();
        store.computed("SuccessDependentOnC", ["c"], move |v| {
            step(&i, 3);
            let c = v.get("c").cloned().unwrap_or(Value::Null);
            Ok(json!(format!("c is {c}")))
        });
    }

    {
        let i = i.clone();
        store.computing("c", move |v| {
            step(&i, 4);
            let c = v.get("c").and_then(Value::as_i64).unwrap_or(0);
            Ok(into_property_map(json!({"d": c * 10, "e": c + 10})))
        });
    }

    store.commit_json(json!({"a": 1, "A": "A"})).unwrap();

    assert_eq!(i.get(), 6);
    assert_eq!(success_runs.get(), 1);
    assert_eq!(time_runs.get(), 1);

    assert_eq!(store.get("a"), Some(&json!(1)));
    assert_eq!(store.get("A"), Some(&json!("A")));
    assert_eq!(store.get("b"), Some(&json!(-1)));
    assert_eq!(store.get("c"), Some(&json!(-2)));
    assert_eq!(store.get("FailedDependentOnCBeforeC"), None);
    assert_eq!(store.get("SuccessDependentOnC"), Some(&json!("c is -2")));
    assert_eq!(store.get("d"), Some(&json!(-20)));
    assert_eq!(store.get("e"), Some(&json!(8)));
    assert_eq!(store.get("onlyCommitIsValidIfDefinedPreviously"), None);

    // Committing the dependency directly reaches the rule registered before it.
    store
        .commit_json(json!({"SuccessDependentOnC": true}))
        .unwrap();

    assert_eq!(
        store.get("onlyCommitIsValidIfDefinedPreviously"),
        Some(&json!("SuccessDependentOnC is true"))
    );
    assert_eq!(i.get(), 6);
}
