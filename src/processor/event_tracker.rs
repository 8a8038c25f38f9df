//! Per-(species, action-kind) rate limiting.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Kinds of side-effecting events the tracker rate-limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Detection log file write.
    LogToFile,
    /// Database save.
    DatabaseSave,
    /// Remote upload.
    RemoteUpload,
    /// Message-bus publish.
    BusPublish,
    /// External command execution.
    CommandExec,
}

/// Suppresses repeated events for the same species within an interval.
///
/// Actions consult the tracker before doing I/O and no-op when denied, so
/// one noisy bird does not hammer the database or the network.
pub struct EventTracker {
    interval: Duration,
    clock: SharedClock,
    events: Mutex<HashMap<(String, EventKind), DateTime<Utc>>>,
}

impl EventTracker {
    /// Create a tracker with the given suppression interval.
    #[must_use]
    pub fn new(interval: Duration, clock: SharedClock) -> Self {
        Self {
            interval,
            clock,
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an event for `(species, kind)` may fire now.
    ///
    /// Returns `true` and records the timestamp when no event for the pair
    /// fired within the interval; stale records are overwritten on lookup.
    pub fn track_event(&self, species: &str, kind: EventKind) -> bool {
        let now = self.clock.now();
        let key = (species.to_lowercase(), kind);

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&last) = events.get(&key) {
            if now - last < self.interval {
                return false;
            }
        }
        events.insert(key, now);
        true
    }
}

impl std::fmt::Debug for EventTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTracker")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
