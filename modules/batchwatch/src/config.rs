use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub const MAX_TRAILING_PASSES_ENV: &str = "BATCHWATCH_MAX_TRAILING_PASSES";

/// Trailing passes allowed per `commit` unless configured otherwise.
pub const DEFAULT_MAX_TRAILING_PASSES: usize = 1024;

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cap on trailing-commit passes run by a single `commit` call.
    /// `None` lets a trailing-commit chain run until it settles.
    pub max_trailing_passes: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_trailing_passes: Some(DEFAULT_MAX_TRAILING_PASSES),
        }
    }
}

impl StoreConfig {
    /// Configuration with no cap on trailing passes.
    pub fn unbounded() -> Self {
        Self {
            max_trailing_passes: None,
        }
    }

    pub fn with_max_trailing_passes(mut self, limit: Option<usize>) -> Self {
        self.max_trailing_passes = limit;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `BATCHWATCH_MAX_TRAILING_PASSES`: unset keeps the default, `0` or
    /// `unlimited` removes the cap, a positive integer sets it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = env::var(MAX_TRAILING_PASSES_ENV) {
            config.max_trailing_passes = parse_pass_limit(&raw)?;
        }
        tracing::debug!(
            max_trailing_passes = ?config.max_trailing_passes,
            "Store config loaded"
        );
        Ok(config)
    }
}

fn parse_pass_limit(raw: &str) -> Result<Option<usize>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(None);
    }
    match raw.parse::<usize>() {
        Ok(0) => Ok(None),
        Ok(limit) => Ok(Some(limit)),
        Err(_) => Err(StoreError::Config(format!(
            "{MAX_TRAILING_PASSES_ENV} must be a non-negative integer or \"unlimited\", got {raw:?}"
        ))),
    }
}
