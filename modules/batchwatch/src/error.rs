//! Typed errors for commit processing and configuration.

use thiserror::Error;

use crate::dispatch::ObserverId;

/// Errors surfaced by [`Store::commit`](crate::Store::commit).
///
/// Any callback failure aborts the commit pass in progress. Values already
/// written by that pass stay written; its queued trailing calls and trailing
/// data are dropped.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A derive-from or derive-to function failed
    #[error("derivation of {property} failed: {source}")]
    Derivation {
        property: String,
        #[source]
        source: anyhow::Error,
    },

    /// An observer callback failed
    #[error("observer {id} failed: {source}")]
    Observer {
        id: ObserverId,
        #[source]
        source: anyhow::Error,
    },

    /// A trailing call failed
    #[error("trailing call failed: {source}")]
    TrailingCall {
        #[source]
        source: anyhow::Error,
    },

    /// Trailing commits kept producing new data past the configured cap
    #[error("trailing commits exceeded {limit} passes")]
    TrailingPassLimit { limit: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
