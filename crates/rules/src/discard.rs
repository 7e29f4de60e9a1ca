//! Age-based discarding of stale events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eventexporter_core::Event;

/// Drops events last observed longer ago than `threshold`.
///
/// A zero threshold disables the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeFilter {
    threshold: Duration,
}

impl AgeFilter {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn is_enabled(&self) -> bool {
        !self.threshold.is_zero()
    }

    /// Whether `event` is too old to be counted at `now`.
    ///
    /// Events without any observation timestamp are discarded when the
    /// filter is enabled. Timestamps in the future are never discarded.
    pub fn should_discard(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(observed) = event.last_observed_time() else {
            return true;
        };
        match (now - observed).to_std() {
            Ok(age) => age > self.threshold,
            // negative age
            Err(_) => false,
        }
    }
}
