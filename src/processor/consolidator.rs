//! Prediction consolidation: pre-filter chain and pending-map folding.

use crate::constants::FLUSH_DELAY_SECS;
use crate::detection::{Detection, PendingDetection, PredictionBatch, SpeciesScore};
use crate::observation::{clip_name, parse_species_tag, Note};
use crate::processor::Processor;
use chrono::Duration;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError};
use tracing::{debug, info, warn};

impl Processor {
    /// Consume one prediction batch: run the pre-filter chain and fold the
    /// survivors into the pending map.
    pub(crate) fn process_batch(&self, batch: &PredictionBatch) {
        let delay = Duration::seconds(FLUSH_DELAY_SECS);

        for detection in self.prefilter_batch(batch) {
            let species_lower = detection.note.common_name.to_lowercase();
            let confidence = detection.note.confidence;
            let base = self.base_confidence_threshold(&species_lower);

            {
                let mut pending = self
                    .pending_map()
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                match pending.entry(species_lower.clone()) {
                    Entry::Occupied(mut existing) => {
                        existing.get_mut().fold(detection, self.clock().now());
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(PendingDetection::new(detection, batch.start_time, delay));
                    }
                }
            }

            self.dynamic_thresholds().update(&species_lower, confidence, base);
        }
    }

    /// Apply the per-prediction pre-filter chain to a batch.
    ///
    /// Order: parse, side-channel dog/human timestamping, human privacy
    /// drop, confidence floor, allow-list, dynamic-threshold registration.
    fn prefilter_batch(&self, batch: &PredictionBatch) -> Vec<Detection> {
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = batch.elapsed.as_millis() as u64;
        self.metrics().record_process_time(elapsed_ms);

        let mut detections = Vec::new();

        for result in batch.results.iter() {
            let (scientific, common) = match parse_species_tag(&result.species) {
                Ok(names) => names,
                Err(e) => {
                    warn!("Dropping prediction: {e}");
                    continue;
                }
            };
            let species_lower = common.to_lowercase();

            // Side-channel detectors record timing metadata without
            // themselves dropping the current prediction.
            self.handle_dog_detection(batch, &species_lower, result);
            self.handle_human_detection(batch, &species_lower, result);

            let base = self.base_confidence_threshold(&species_lower);

            // Human vocalizations never reach the actions stage.
            if species_lower.contains("human") && result.confidence > base {
                continue;
            }

            let floor = self.dynamic_thresholds().adjusted_floor(&species_lower, base);
            if result.confidence <= floor {
                continue;
            }

            if !self
                .range_filter()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_included(&result.species)
            {
                if self.settings().debug {
                    debug!("Species not on included list: {}", result.species);
                }
                continue;
            }

            self.dynamic_thresholds().register(&species_lower, base);

            let extension = self.settings().realtime.audio_export.format.extension();
            let clip = clip_name(&scientific, result.confidence, self.clock().now(), extension);
            let end_time = batch.start_time + Duration::seconds(FLUSH_DELAY_SECS);

            let note = Note::new(
                batch.start_time,
                end_time,
                scientific,
                common,
                result.confidence,
                batch.source.clone(),
                clip,
                elapsed_ms,
            );

            detections.push(Detection {
                note,
                results: Arc::clone(&batch.results),
                pcm: Arc::clone(&batch.pcm),
            });
        }

        detections
    }

    /// Record a dog bark for the batch's source.
    fn handle_dog_detection(
        &self,
        batch: &PredictionBatch,
        species_lower: &str,
        result: &SpeciesScore,
    ) {
        let config = &self.settings().realtime.dog_bark_filter;
        if config.enabled && species_lower.contains("dog") && result.confidence > config.confidence
        {
            info!(
                "Dog detected with confidence {:.3}/{:.3} from source {}",
                result.confidence, config.confidence, batch.source
            );
            self.last_dog_map()
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(batch.source.clone(), batch.start_time);
        }
    }

    /// Record a human vocalization for the batch's source.
    fn handle_human_detection(
        &self,
        batch: &PredictionBatch,
        species_lower: &str,
        result: &SpeciesScore,
    ) {
        let config = &self.settings().realtime.privacy_filter;
        if config.enabled && species_lower.contains("human") && result.confidence > config.confidence
        {
            info!(
                "Human detected with confidence {:.3}/{:.3} from source {}",
                result.confidence, config.confidence, batch.source
            );
            self.last_human_map()
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(batch.source.clone(), batch.start_time);
        }
    }

    /// Base confidence floor for a species: the custom per-species value
    /// when configured, else the global threshold.
    pub(crate) fn base_confidence_threshold(&self, species_lower: &str) -> f32 {
        self.settings()
            .custom_threshold(species_lower)
            .unwrap_or(self.settings().detector.threshold)
    }
}
