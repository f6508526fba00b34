//! External lean/displacement parameters.
//!
//! The feed is produced elsewhere and only consumed here. The file form is
//! a JSON object keyed by pair symbol:
//!
//! ```json
//! { "XETHZEUR": { "lean": 1, "l": "0.001", "displacement": "0.002" } }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use midspread_quoting::LeanState;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Source of lean parameters for one pair.
pub trait LeanSource: Send + Sync {
    fn load(&self, pair_symbol: &str) -> AppResult<LeanState>;
}

/// Lean feed backed by a JSON file that is re-read on every load.
pub struct FileLeanFeed {
    path: PathBuf,
}

impl FileLeanFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LeanSource for FileLeanFeed {
    fn load(&self, pair_symbol: &str) -> AppResult<LeanState> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            AppError::LeanFeed(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let entries: HashMap<String, LeanState> = serde_json::from_str(&content)
            .map_err(|e| AppError::LeanFeed(format!("Failed to parse lean feed: {e}")))?;
        let state = entries
            .get(pair_symbol)
            .copied()
            .ok_or_else(|| AppError::LeanFeed(format!("No lean entry for {pair_symbol}")))?;
        state.validate()?;

        debug!(
            pair = pair_symbol,
            lean = state.lean,
            tier_width = %state.tier_width,
            displacement = %state.displacement,
            "Loaded lean parameters"
        );
        Ok(state)
    }
}

/// In-memory lean source; the value can be swapped between loads.
pub struct FixedLeanFeed(Mutex<LeanState>);

impl FixedLeanFeed {
    pub fn new(state: LeanState) -> Self {
        Self(Mutex::new(state))
    }

    pub fn set(&self, state: LeanState) {
        *self.0.lock() = state;
    }
}

impl LeanSource for FixedLeanFeed {
    fn load(&self, _pair_symbol: &str) -> AppResult<LeanState> {
        let state = *self.0.lock();
        state.validate()?;
        Ok(state)
    }
}

/// Interval timer for feed reloads, independent of the cycle cadence.
#[derive(Debug, Clone)]
pub struct ReloadSchedule {
    interval: Duration,
    last: Option<Instant>,
}

impl ReloadSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Start the interval at `now` (after the initial load).
    pub fn loaded_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: Some(now),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Make the next `is_due` check succeed.
    pub fn force(&mut self) {
        self.last = None;
    }
}
