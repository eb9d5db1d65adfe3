//! Tick filtering: interval gate and per-channel debounce.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cheap short-circuits applied before callbacks are dispatched.
///
/// Caps dispatch-loop invocation rate independent of feed publish rate.
pub struct TickFilter {
    interval: String,
    quiet: Duration,
    last: HashMap<String, Instant>,
}

impl TickFilter {
    /// Build a filter for the given monitoring interval and quiet period.
    #[must_use]
    pub fn new(interval: impl Into<String>, quiet: Duration) -> Self {
        Self {
            interval: interval.into(),
            quiet,
            last: HashMap::new(),
        }
    }

    /// Whether the message passes the interval gate.
    ///
    /// Messages carrying a top-level `interval` field are only accepted
    /// when it matches the monitoring interval; messages without one pass.
    #[must_use]
    pub fn interval_matches(&self, payload: &serde_json::Value) -> bool {
        payload
            .get("interval")
            .map_or(true, |value| value.as_str() == Some(self.interval.as_str()))
    }

    /// Whether a tick on `channel` clears the quiet period right now.
    pub fn accept(&mut self, channel: &str) -> bool {
        self.accept_at(channel, Instant::now())
    }

    /// Debounce with an explicit clock, for deterministic tests.
    pub fn accept_at(&mut self, channel: &str, now: Instant) -> bool {
        match self.last.get(channel) {
            Some(previous) if now.duration_since(*previous) < self.quiet => false,
            _ => {
                self.last.insert(channel.to_string(), now);
                true
            }
        }
    }
}
