//! Tracker configuration.
//!
//! Loaded from a TOML table such as:
//!
//! ```toml
//! unblock_buffer = 8096
//! stats_interval = "1s"
//! duplicate_wait = "500ms"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlockedError, BlockedResult};

/// Default capacity of the unblock notification channel.
pub const DEFAULT_UNBLOCK_BUFFER: usize = 8096;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockedConfig {
    /// Capacity of the bounded unblock channel. Callers of `unblock`
    /// wait once this many notifications are queued.
    pub unblock_buffer: usize,
    /// How often `emit_stats` publishes gauges (e.g., "1s").
    pub stats_interval: String,
    /// How long the duplicate reaper parks in `get_duplicates` per round.
    pub duplicate_wait: String,
}

impl Default for BlockedConfig {
    fn default() -> Self {
        Self {
            unblock_buffer: DEFAULT_UNBLOCK_BUFFER,
            stats_interval: "1s".to_string(),
            duplicate_wait: "1s".to_string(),
        }
    }
}

impl BlockedConfig {
    pub fn from_file(path: &Path) -> BlockedResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> BlockedResult<Self> {
        let config: BlockedConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the tracker cannot run with.
    pub fn validate(&self) -> BlockedResult<()> {
        if self.unblock_buffer == 0 {
            return Err(BlockedError::InvalidConfig(
                "unblock_buffer must be greater than zero".to_string(),
            ));
        }
        parse_duration(&self.stats_interval)?;
        parse_duration(&self.duplicate_wait)?;
        Ok(())
    }

    /// Parsed `stats_interval`.
    pub fn stats_period(&self) -> BlockedResult<Duration> {
        parse_duration(&self.stats_interval)
    }

    /// Parsed `duplicate_wait`.
    pub fn duplicate_wait_period(&self) -> BlockedResult<Duration> {
        parse_duration(&self.duplicate_wait)
    }
}

/// Parse a "<n>s" or "<n>ms" duration string.
pub fn parse_duration(s: &str) -> BlockedResult<Duration> {
    let s = s.trim();
    let invalid = || BlockedError::InvalidConfig(format!("invalid duration: {s:?}"));

    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| invalid())
    } else {
        Err(invalid())
    }
}
