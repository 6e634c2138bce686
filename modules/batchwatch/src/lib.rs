//! Batched, dependency-aware property store.
//!
//! Callers commit a batch of named values at once. Computed properties are
//! derived from registered rules, and each observer whose watched properties
//! changed is notified exactly once per commit, however many of them changed
//! together. Observers may defer callbacks (trailing calls, deduplicated by
//! identity) and data (trailing commits); both settle before `commit` returns.
//!
//! Single-threaded and fully synchronous. Values are opaque `serde_json::Value`s.

pub mod computation;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod projection;
pub mod store;
pub mod trailing;
pub mod value;

pub use config::StoreConfig;
pub use dispatch::{IntoWatchList, ObserverId};
pub use error::{Result, StoreError};
pub use projection::Projection;
pub use store::{create_store, Store};
pub use trailing::{IntoTrailingCalls, Trailing, TrailingCall};
pub use value::{into_property_map, PropertyMap};
