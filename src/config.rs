/// Controller configuration
///
/// Settings come from defaults, a JSON document, or environment variables:
///
/// - `GRIDSYNC_LOADING_DELAY_MS`: how long work may run before the loading
///   indicator is revealed
/// - `GRIDSYNC_FETCH_MARGIN`: rows fetched above and below the viewport

use crate::error::{Result, ViewSyncError};
use crate::paging::MarginPaging;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LOADING_DELAY_MS: u64 = 500;
pub const DEFAULT_FETCH_MARGIN: usize = 50;

pub const LOADING_DELAY_VAR: &str = "GRIDSYNC_LOADING_DELAY_MS";
pub const FETCH_MARGIN_VAR: &str = "GRIDSYNC_FETCH_MARGIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub loading_delay_ms: u64,
    pub fetch_margin: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            loading_delay_ms: DEFAULT_LOADING_DELAY_MS,
            fetch_margin: DEFAULT_FETCH_MARGIN,
        }
    }
}

impl ControllerConfig {
    pub fn loading_delay(&self) -> Duration {
        Duration::from_millis(self.loading_delay_ms)
    }

    /// The margin-based paging policy these settings describe
    pub fn paging(&self) -> MarginPaging {
        MarginPaging::new(self.fetch_margin)
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ViewSyncError::Config(e.to_string()))
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; unset names keep their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ControllerConfig::default();
        if let Some(value) = lookup(LOADING_DELAY_VAR) {
            config.loading_delay_ms = parse_var(LOADING_DELAY_VAR, &value)?;
        }
        if let Some(value) = lookup(FETCH_MARGIN_VAR) {
            config.fetch_margin = parse_var(FETCH_MARGIN_VAR, &value)?;
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ViewSyncError::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}
