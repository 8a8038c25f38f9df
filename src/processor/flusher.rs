//! Timer-driven promotion of pending detections.

use crate::constants::PREDICTION_WINDOW_SECS;
use crate::detection::PendingDetection;
use crate::error::{Error, Result};
use crate::processor::worker::{Task, TaskKind};
use crate::processor::Processor;
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::Sender;
use std::sync::{Arc, PoisonError};
use tracing::{debug, info};

/// Minimum number of matching windows required before a pending detection
/// can be promoted.
///
/// Maps the window overlap to "roughly 3 seconds of independent windows
/// agreed": `max(1, floor(3 / max(0.1, 3.0 - overlap)))`.
pub(crate) fn min_detections_for_overlap(overlap: f32) -> u32 {
    let segment_length = (PREDICTION_WINDOW_SECS - overlap).max(0.1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let min = (PREDICTION_WINDOW_SECS / segment_length).floor() as u32;
    min.max(1)
}

impl Processor {
    /// One flusher sweep: promote or discard every pending entry whose
    /// deadline has passed, then clean up expired dynamic thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskQueueClosed`] when the worker channel is gone
    /// while detections still need enqueueing; this is fatal for the
    /// pipeline.
    pub(crate) fn flush_pending(&self, tasks: &Sender<Task>) -> Result<()> {
        let now = self.clock().now();

        {
            let mut pending = self
                .pending_map()
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let due: Vec<String> = pending
                .iter()
                .filter(|(_, entry)| now > entry.flush_deadline)
                .map(|(species, _)| species.clone())
                .collect();

            for species in due {
                let Some(entry) = pending.remove(&species) else {
                    continue;
                };

                if let Some(reason) = self.discard_reason(&entry, now) {
                    info!(
                        "Discarding detection of {species} from source {} due to {reason}",
                        entry.source
                    );
                    continue;
                }

                self.promote(entry, &species, tasks)?;
            }
        }

        self.dynamic_thresholds().cleanup();
        Ok(())
    }

    /// Post-filter chain: why a due pending entry must be discarded, if at
    /// all.
    fn discard_reason(&self, entry: &PendingDetection, now: DateTime<Utc>) -> Option<String> {
        let min_detections = self.min_detections();
        if entry.count < min_detections {
            return Some(format!(
                "false positive, matched {}/{} times",
                entry.count, min_detections
            ));
        }

        if self.settings().realtime.privacy_filter.enabled {
            let last_human = self
                .last_human_map()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&entry.source)
                .copied();
            if last_human.is_some_and(|t| t > entry.first_detected) {
                return Some("privacy filter".to_string());
            }
        }

        if self.settings().realtime.dog_bark_filter.enabled {
            let last_dog = self
                .last_dog_map()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&entry.source)
                .copied();
            if let Some(last_dog) = last_dog {
                if self.settings().realtime.dog_bark_filter.debug {
                    debug!("Last dog detection for {}: {last_dog}", entry.source);
                }
                if self.dog_bark_applies(&entry.detection.note.common_name, last_dog, now)
                    || self.dog_bark_applies(&entry.detection.note.scientific_name, last_dog, now)
                {
                    return Some("recent dog bark".to_string());
                }
            }
        }

        None
    }

    /// Whether a species name is bark-susceptible and the bark is still
    /// within the remember window.
    fn dog_bark_applies(&self, name: &str, last_dog: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let config = &self.settings().realtime.dog_bark_filter;
        now - last_dog < Duration::minutes(config.remember)
            && config.species.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Promote an approved detection: fix its begin time, plan its actions,
    /// and enqueue one task per action.
    fn promote(&self, mut entry: PendingDetection, species: &str, tasks: &Sender<Task>) -> Result<()> {
        info!(
            "Approving detection of {species} from source {}, matched {} times",
            entry.source, entry.count
        );

        entry.detection.note.begin_time = entry.first_detected;
        let detection = Arc::new(entry.detection);

        for action in self.actions_for(&detection) {
            tasks
                .send(Task {
                    kind: TaskKind::Action,
                    detection: Arc::clone(&detection),
                    action,
                })
                .map_err(|_| Error::TaskQueueClosed)?;
        }

        self.metrics().increment_detections(&detection.note.common_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_detections_for_overlap() {
        assert_eq!(min_detections_for_overlap(0.0), 1);
        assert_eq!(min_detections_for_overlap(1.0), 1);
        assert_eq!(min_detections_for_overlap(1.5), 2);
        assert_eq!(min_detections_for_overlap(2.0), 3);
        assert_eq!(min_detections_for_overlap(2.5), 6);
    }
}
