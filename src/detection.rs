//! Core detection data model.
//!
//! A [`PredictionBatch`] is one analyzed audio window as delivered by the
//! inference engine. Predictions that survive the pre-filter chain become
//! [`Detection`]s, which are held in the pending map as part of a
//! [`PendingDetection`] until the flusher either discards or promotes them.

use crate::observation::Note;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// One entry of the classifier result vector.
#[derive(Debug, Clone, Serialize)]
pub struct SpeciesScore {
    /// Species tag, `"<Scientific name>_<Common name>"`.
    pub species: String,
    /// Prediction confidence, 0.0-1.0.
    pub confidence: f32,
}

/// All predictions for a single analyzed audio window.
///
/// Produced by the inference engine, consumed once by the consolidator.
/// The PCM buffer and result vector are reference-counted so pending-map
/// replacement and task fan-out never copy audio.
#[derive(Debug, Clone)]
pub struct PredictionBatch {
    /// Audio source the window came from (capture device or stream URL).
    pub source: String,
    /// Wall time at the start of the window.
    pub start_time: DateTime<Utc>,
    /// Inference processing time for this window.
    pub elapsed: std::time::Duration,
    /// Raw 3-second PCM window containing the detections.
    pub pcm: Arc<Vec<u8>>,
    /// Full classifier result vector for the window.
    pub results: Arc<Vec<SpeciesScore>>,
}

/// A prediction that passed the pre-filter chain.
///
/// Becomes a confirmed detection when the flusher promotes it; until then
/// the pending map holds the highest-confidence instance seen.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Observation record for the best matching prediction.
    pub note: Note,
    /// Full classifier result vector from the window that produced it.
    pub results: Arc<Vec<SpeciesScore>>,
    /// 3-second PCM window containing the detection.
    pub pcm: Arc<Vec<u8>>,
}

/// A detection held in memory awaiting its flush deadline.
#[derive(Debug, Clone)]
pub(crate) struct PendingDetection {
    /// Best detection seen so far.
    pub detection: Detection,
    /// Highest confidence seen; monotonically non-decreasing.
    pub confidence: f32,
    /// Audio source of the best detection.
    pub source: String,
    /// Time the species was first detected.
    pub first_detected: DateTime<Utc>,
    /// Last time this entry was updated.
    pub last_updated: DateTime<Utc>,
    /// Deadline after which the entry is flushed; never moved forward.
    pub flush_deadline: DateTime<Utc>,
    /// Number of matching predictions folded into this entry.
    pub count: u32,
}

impl PendingDetection {
    /// Create a fresh entry for a first surviving prediction.
    pub(crate) fn new(detection: Detection, first_detected: DateTime<Utc>, delay: Duration) -> Self {
        let confidence = detection.note.confidence;
        let source = detection.note.source.clone();
        Self {
            detection,
            confidence,
            source,
            first_detected,
            last_updated: first_detected,
            flush_deadline: first_detected + delay,
            count: 1,
        }
    }

    /// Fold a subsequent matching prediction into this entry.
    ///
    /// The stored detection (including PCM) is replaced only when the new
    /// confidence is strictly greater; the count is incremented regardless
    /// and the flush deadline never moves.
    pub(crate) fn fold(&mut self, detection: Detection, now: DateTime<Utc>) {
        let confidence = detection.note.confidence;
        if confidence > self.confidence {
            self.source = detection.note.source.clone();
            self.detection = detection;
            self.confidence = confidence;
            self.last_updated = now;
        }
        self.count += 1;
    }
}
