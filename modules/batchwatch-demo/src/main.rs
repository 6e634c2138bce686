use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use batchwatch::{into_property_map, Store, StoreConfig, TrailingCall};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("batchwatch=info".parse()?))
        .init();

    info!("batchwatch demo starting...");

    let config = StoreConfig::from_env()?;
    info!(max_trailing_passes = ?config.max_trailing_passes, "Config loaded");

    let mut store = Store::with_config(config);
    let layouts = Rc::new(Cell::new(0u32));

    // One layout per commit, however many observers ask for it.
    let relayout = {
        let layouts = layouts.clone();
        TrailingCall::new(move || {
            layouts.set(layouts.get() + 1);
            info!(layouts = layouts.get(), "Layout pass");
            Ok(())
        })
    };

    store.computed("area", ["width", "height"], |v| {
        let width = v.get("width").and_then(Value::as_f64).unwrap_or(0.0);
        let height = v.get("height").and_then(Value::as_f64).unwrap_or(0.0);
        Ok(json!(width * height))
    });

    store.computing("zoom", |v| {
        let zoom = v.get("zoom").and_then(Value::as_f64).unwrap_or(1.0);
        Ok(into_property_map(json!({
            "scaled_width": v.get("width").and_then(Value::as_f64).unwrap_or(0.0) * zoom,
            "scaled_height": v.get("height").and_then(Value::as_f64).unwrap_or(0.0) * zoom,
        })))
    });

    {
        let relayout = relayout.clone();
        store.watch(["width", "height"], move |new_val, old_val, t| {
            let new = serde_json::to_string(new_val)?;
            let old = serde_json::to_string(old_val)?;
            info!(new = %new, old = %old, "Size changed");
            t.call(&relayout);
            Ok(())
        });
    }

    store.watch("width", move |new_val, _, t| {
        // Keep the viewport at least as wide as the content.
        let width = new_val.get("width").and_then(Value::as_f64).unwrap_or(0.0);
        let viewport = t.get("viewport").and_then(Value::as_f64).unwrap_or(0.0);
        if width > viewport {
            t.commit_json(json!({"viewport": width}));
        }
        Ok(relayout.clone())
    });

    store.watch("area", |new_val, old_val, _| {
        info!(
            area = %new_val.get("area").unwrap_or(&serde_json::Value::Null),
            previous = %old_val.get("area").unwrap_or(&serde_json::Value::Null),
            "Area changed"
        );
        Ok(())
    });

    store.watch("viewport", |new_val, _, _| {
        info!(viewport = %new_val.get("viewport").unwrap_or(&serde_json::Value::Null), "Viewport grew");
        Ok(())
    });

    store
        .commit_json(json!({"width": 10, "height": 10}))?
        .commit_json(json!({"zoom": 2}))?
        .commit_with(|snapshot| {
            let width = snapshot.get("width").and_then(Value::as_f64).unwrap_or(0.0);
            into_property_map(json!({"width": width * 2.0}))
        })?
        // No net change: nothing is dispatched.
        .commit_json(json!({"height": 10}))?;

    info!(
        layouts = layouts.get(),
        observers = store.observer_count(),
        rules = store.rule_count(),
        "Demo finished"
    );
    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);

    Ok(())
}
