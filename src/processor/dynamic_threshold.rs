//! Species-adaptive confidence floors.
//!
//! Species that repeatedly produce high-confidence detections earn a lower
//! effective floor for a bounded time, raising sensitivity for birds that
//! are demonstrably present without opening the gate for everything else.

use crate::clock::SharedClock;
use crate::config::DynamicThresholdConfig;
use crate::constants::dynamic_threshold::{LEVEL_SCALE, MAX_LEVEL};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Dynamic threshold state for one species.
#[derive(Debug, Clone)]
struct DynamicThreshold {
    level: u8,
    current_floor: f32,
    expires: DateTime<Utc>,
    high_conf_count: u32,
}

/// Registry of per-species adaptive floors, keyed by lowercased common name.
///
/// Entries exist only for species that have passed the allow-list at least
/// once; expired entries are dropped by the cleanup pass and re-enter at
/// level 0 on their next observation.
pub struct DynamicThresholdRegistry {
    config: DynamicThresholdConfig,
    clock: SharedClock,
    entries: RwLock<HashMap<String, DynamicThreshold>>,
}

impl DynamicThresholdRegistry {
    /// Create a registry from config.
    #[must_use]
    pub fn new(config: DynamicThresholdConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether dynamic thresholds are active.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Ensure an entry exists for a species that passed the allow-list.
    pub fn register(&self, species_lower: &str, base_floor: f32) {
        if !self.config.enabled {
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(species_lower.to_string())
            .or_insert_with(|| DynamicThreshold {
                level: 0,
                current_floor: base_floor,
                expires: self.clock.now() + Duration::hours(self.config.valid_hours),
                high_conf_count: 0,
            });
    }

    /// Fold a surviving prediction into the species entry.
    ///
    /// A hit at or above the trigger confidence raises the level (capped),
    /// recomputes the floor, and refreshes the expiry.
    pub fn update(&self, species_lower: &str, confidence: f32, base_floor: f32) {
        if !self.config.enabled || confidence < self.config.trigger {
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(species_lower) else {
            return;
        };

        entry.high_conf_count += 1;
        if entry.level < MAX_LEVEL {
            entry.level += 1;
        }
        entry.current_floor =
            (base_floor * LEVEL_SCALE[entry.level as usize]).max(self.config.min);
        entry.expires = self.clock.now() + Duration::hours(self.config.valid_hours);

        debug!(
            "Dynamic threshold for {species_lower} now level {} (floor {:.2}, {} high-confidence hits)",
            entry.level, entry.current_floor, entry.high_conf_count
        );
    }

    /// Effective floor for a species: the dynamic floor can only lower the
    /// base, never raise it above.
    #[must_use]
    pub fn adjusted_floor(&self, species_lower: &str, base_floor: f32) -> f32 {
        if !self.config.enabled {
            return base_floor;
        }

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(species_lower)
            .map_or(base_floor, |entry| entry.current_floor.min(base_floor))
    }

    /// Drop entries whose validity window has elapsed.
    pub fn cleanup(&self) {
        if !self.config.enabled {
            return;
        }

        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|species, entry| {
            let keep = entry.expires > now;
            if !keep {
                debug!("Dynamic threshold for {species} expired, reverting to base");
            }
            keep
        });
    }

    /// Number of tracked species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no species are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DynamicThresholdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicThresholdRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
