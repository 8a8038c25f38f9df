//! Lightweight pipeline counters.
//!
//! A telemetry exporter (Prometheus endpoint or similar) is out of scope;
//! the core only maintains the counters it would expose.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Counters maintained by the detection pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    detections_total: AtomicU64,
    last_process_time_ms: AtomicU64,
    detections_by_species: Mutex<HashMap<String, u64>>,
}

impl Metrics {
    /// Create zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inference processing time of the latest window.
    pub fn record_process_time(&self, elapsed_ms: u64) {
        self.last_process_time_ms.store(elapsed_ms, Ordering::Relaxed);
    }

    /// Bump the confirmed-detection counter for a species.
    pub fn increment_detections(&self, common_name: &str) {
        self.detections_total.fetch_add(1, Ordering::Relaxed);
        let mut by_species = self
            .detections_by_species
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *by_species.entry(common_name.to_lowercase()).or_insert(0) += 1;
    }

    /// Total confirmed detections since startup.
    #[must_use]
    pub fn detections_total(&self) -> u64 {
        self.detections_total.load(Ordering::Relaxed)
    }

    /// Confirmed detections for one species.
    #[must_use]
    pub fn detections_for(&self, common_name: &str) -> u64 {
        self.detections_by_species
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&common_name.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Processing time of the latest window in milliseconds.
    #[must_use]
    pub fn last_process_time_ms(&self) -> u64 {
        self.last_process_time_ms.load(Ordering::Relaxed)
    }
}
