//! Detection consolidation pipeline.
//!
//! The [`Processor`] owns the shared pipeline state: the pending map, the
//! side-channel dog/human timestamp maps, the dynamic threshold registry,
//! the event tracker, and handles to the external collaborators. Spawning
//! it starts three kinds of tasks:
//!
//! - one consolidator draining the prediction ingress channel,
//! - one flusher sweeping the pending map every second,
//! - a fixed pool of workers executing per-detection actions.

mod actions;
mod consolidator;
mod dynamic_threshold;
mod event_tracker;
mod execute;
mod flusher;
mod worker;

pub use dynamic_threshold::DynamicThresholdRegistry;
pub use event_tracker::{EventKind, EventTracker};
pub use execute::{sanitize_value, validate_command_path, CommandParam};
pub(crate) use worker::Task;

use crate::audio::ClipBuffer;
use crate::clock::SharedClock;
use crate::config::{validate_settings, Settings};
use crate::constants::{DEFAULT_WORKER_COUNT, FLUSHER_TICK_SECS, TASK_QUEUE_CAPACITY};
use crate::datastore::Datastore;
use crate::detection::{PendingDetection, PredictionBatch};
use crate::error::Result;
use crate::integrations::{ImageProvider, MessageBus, RangeFilterState, RangeProvider, UploadClient};
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info};

/// Create the bounded prediction ingress channel.
///
/// The inference engine holds the sender; [`Processor::spawn`] takes the
/// receiver. Dropping every sender closes the channel and begins pipeline
/// shutdown.
#[must_use]
pub fn ingress_channel(capacity: usize) -> (Sender<PredictionBatch>, Receiver<PredictionBatch>) {
    bounded(capacity)
}

/// The detection consolidation state machine.
pub struct Processor {
    settings: Arc<Settings>,
    clock: SharedClock,
    datastore: Option<Arc<dyn Datastore>>,
    upload_client: Option<Arc<dyn UploadClient>>,
    bus_client: Option<Arc<dyn MessageBus>>,
    image_provider: Option<Arc<dyn ImageProvider>>,
    clip_buffer: Option<Arc<dyn ClipBuffer>>,
    range_provider: Option<Arc<dyn RangeProvider>>,
    range_filter: Arc<RwLock<RangeFilterState>>,
    event_tracker: Arc<EventTracker>,
    dynamic_thresholds: DynamicThresholdRegistry,
    metrics: Arc<Metrics>,
    pending: Mutex<HashMap<String, PendingDetection>>,
    last_dog: RwLock<HashMap<String, DateTime<Utc>>>,
    last_human: RwLock<HashMap<String, DateTime<Utc>>>,
    min_detections: u32,
}

impl Processor {
    /// Create a processor from validated settings.
    ///
    /// External collaborators are attached with the `with_*` builders; a
    /// missing collaborator disables the actions that need it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the settings are invalid.
    pub fn new(settings: Settings, clock: SharedClock) -> Result<Self> {
        validate_settings(&settings)?;

        #[allow(clippy::cast_possible_wrap)]
        let interval = chrono::Duration::seconds(settings.realtime.interval as i64);
        let min_detections = flusher::min_detections_for_overlap(settings.detector.overlap);

        Ok(Self {
            event_tracker: Arc::new(EventTracker::new(interval, Arc::clone(&clock))),
            dynamic_thresholds: DynamicThresholdRegistry::new(
                settings.realtime.dynamic_threshold.clone(),
                Arc::clone(&clock),
            ),
            settings: Arc::new(settings),
            clock,
            datastore: None,
            upload_client: None,
            bus_client: None,
            image_provider: None,
            clip_buffer: None,
            range_provider: None,
            range_filter: Arc::new(RwLock::new(RangeFilterState::default())),
            metrics: Arc::new(Metrics::new()),
            pending: Mutex::new(HashMap::new()),
            last_dog: RwLock::new(HashMap::new()),
            last_human: RwLock::new(HashMap::new()),
            min_detections,
        })
    }

    /// Attach the datastore the persist action saves through.
    #[must_use]
    pub fn with_datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    /// Attach the remote upload client.
    #[must_use]
    pub fn with_upload_client(mut self, client: Arc<dyn UploadClient>) -> Self {
        self.upload_client = Some(client);
        self
    }

    /// Attach the message-bus client.
    #[must_use]
    pub fn with_bus_client(mut self, client: Arc<dyn MessageBus>) -> Self {
        self.bus_client = Some(client);
        self
    }

    /// Attach the species image provider for bus payloads.
    #[must_use]
    pub fn with_image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image_provider = Some(provider);
        self
    }

    /// Attach the capture buffer clips are exported from.
    #[must_use]
    pub fn with_clip_buffer(mut self, buffer: Arc<dyn ClipBuffer>) -> Self {
        self.clip_buffer = Some(buffer);
        self
    }

    /// Attach the range provider behind the daily allow-list refresh.
    #[must_use]
    pub fn with_range_provider(mut self, provider: Arc<dyn RangeProvider>) -> Self {
        self.range_provider = Some(provider);
        self
    }

    /// Seed the species allow-list, e.g. from persisted state.
    #[must_use]
    pub fn with_allow_list(
        self,
        labels: impl IntoIterator<Item = String>,
        updated: Option<chrono::NaiveDate>,
    ) -> Self {
        *self
            .range_filter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = RangeFilterState::new(labels, updated);
        self
    }

    /// Pipeline metrics.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of species currently held in the pending map.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start the pipeline: consolidator, flusher, and worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error when a pipeline thread cannot be spawned.
    pub fn spawn(self, ingress: Receiver<PredictionBatch>) -> Result<Pipeline> {
        let processor = Arc::new(self);
        let (task_tx, task_rx) = bounded::<Task>(TASK_QUEUE_CAPACITY);
        let workers = worker::spawn_worker_pool(DEFAULT_WORKER_COUNT, &task_rx)?;
        drop(task_rx);
        let (quit_tx, quit_rx) = bounded::<()>(0);

        let consolidator = std::thread::Builder::new().name("consolidator".to_string()).spawn({
            let processor = Arc::clone(&processor);
            move || {
                for batch in &ingress {
                    processor.process_batch(&batch);
                }
                debug!("Ingress channel closed, consolidator exiting");
            }
        })?;

        let flusher = std::thread::Builder::new().name("flusher".to_string()).spawn({
            let processor = Arc::clone(&processor);
            move || -> Result<()> {
                let ticker = crossbeam_channel::tick(StdDuration::from_secs(FLUSHER_TICK_SECS));
                loop {
                    crossbeam_channel::select! {
                        recv(ticker) -> _ => processor.flush_pending(&task_tx)?,
                        recv(quit_rx) -> _ => {
                            debug!("Quit signaled, flusher exiting");
                            return Ok(());
                        }
                    }
                }
            }
        })?;

        info!(
            "Detection pipeline started: {DEFAULT_WORKER_COUNT} workers, flush sweep every {FLUSHER_TICK_SECS}s"
        );

        Ok(Pipeline {
            processor,
            consolidator: Some(consolidator),
            flusher: Some(flusher),
            workers,
            quit: Some(quit_tx),
        })
    }

    // Crate-internal accessors for the pipeline submodules.

    pub(crate) fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    pub(crate) fn event_tracker(&self) -> Arc<EventTracker> {
        Arc::clone(&self.event_tracker)
    }

    pub(crate) fn dynamic_thresholds(&self) -> &DynamicThresholdRegistry {
        &self.dynamic_thresholds
    }

    pub(crate) fn pending_map(&self) -> &Mutex<HashMap<String, PendingDetection>> {
        &self.pending
    }

    pub(crate) fn last_dog_map(&self) -> &RwLock<HashMap<String, DateTime<Utc>>> {
        &self.last_dog
    }

    pub(crate) fn last_human_map(&self) -> &RwLock<HashMap<String, DateTime<Utc>>> {
        &self.last_human
    }

    pub(crate) fn range_filter(&self) -> Arc<RwLock<RangeFilterState>> {
        Arc::clone(&self.range_filter)
    }

    pub(crate) fn datastore(&self) -> Option<Arc<dyn Datastore>> {
        self.datastore.clone()
    }

    pub(crate) fn upload_client(&self) -> Option<Arc<dyn UploadClient>> {
        self.upload_client.clone()
    }

    pub(crate) fn bus_client(&self) -> Option<Arc<dyn MessageBus>> {
        self.bus_client.clone()
    }

    pub(crate) fn image_provider(&self) -> Option<Arc<dyn ImageProvider>> {
        self.image_provider.clone()
    }

    pub(crate) fn clip_buffer(&self) -> Option<Arc<dyn ClipBuffer>> {
        self.clip_buffer.clone()
    }

    pub(crate) fn range_provider(&self) -> Option<Arc<dyn RangeProvider>> {
        self.range_provider.clone()
    }

    pub(crate) fn min_detections(&self) -> u32 {
        self.min_detections
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("pending", &self.pending_count())
            .field("min_detections", &self.min_detections)
            .finish_non_exhaustive()
    }
}

/// Handle to a running pipeline.
pub struct Pipeline {
    processor: Arc<Processor>,
    consolidator: Option<JoinHandle<()>>,
    flusher: Option<JoinHandle<Result<()>>>,
    workers: Vec<JoinHandle<()>>,
    quit: Option<Sender<()>>,
}

impl Pipeline {
    /// The running processor, for metrics and observability.
    #[must_use]
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Wait for orderly shutdown and surface fatal pipeline errors.
    ///
    /// Callers must drop every ingress sender first: the consolidator
    /// drains the closed channel, the flusher stops on its next tick, the
    /// task channel closes, and workers finish their in-flight actions.
    ///
    /// # Errors
    ///
    /// Returns only fatal-class failures, such as the task channel closing
    /// while detections were still being promoted.
    pub fn join(mut self) -> Result<()> {
        if let Some(consolidator) = self.consolidator.take() {
            if consolidator.join().is_err() {
                error!("Consolidator thread panicked");
            }
        }

        // Closing the quit channel stops the flusher; dropping the flusher's
        // task sender closes the worker channel in turn.
        drop(self.quit.take());

        let mut result = Ok(());
        if let Some(flusher) = self.flusher.take() {
            match flusher.join() {
                Ok(flush_result) => result = flush_result,
                Err(_) => error!("Flusher thread panicked"),
            }
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread panicked");
            }
        }

        info!("Detection pipeline stopped");
        result
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::detection::SpeciesScore;
    use crate::error::Error;
    use crate::observation::Note;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeDatastore {
        saved: Mutex<Vec<Note>>,
        fail: bool,
    }

    impl FakeDatastore {
        fn new() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn saved_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    impl Datastore for FakeDatastore {
        fn save(&self, note: &Note, _results: &[SpeciesScore]) -> Result<()> {
            if self.fail {
                return Err(Error::DatastoreSave {
                    message: "disk full".to_string(),
                });
            }
            self.saved.lock().unwrap().push(note.clone());
            Ok(())
        }
    }

    struct FakeRangeProvider {
        calls: AtomicU32,
    }

    impl RangeProvider for FakeRangeProvider {
        fn probable_species(&self, _for_date: chrono::NaiveDate, _floor: f32) -> Result<Vec<SpeciesScore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SpeciesScore {
                species: "Turdus merula_Common Blackbird".to_string(),
                confidence: 0.9,
            }])
        }
    }

    fn start_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap(),
        ))
    }

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.realtime.log.enabled = false;
        settings.output.sqlite.enabled = false;
        settings.realtime.audio_export.enabled = false;
        settings.realtime.dynamic_threshold.enabled = false;
        settings
    }

    fn batch(
        clock_start: DateTime<Utc>,
        offset_secs: i64,
        species: &str,
        confidence: f32,
    ) -> PredictionBatch {
        batch_from(clock_start, offset_secs, "card0", species, confidence)
    }

    fn batch_from(
        clock_start: DateTime<Utc>,
        offset_secs: i64,
        source: &str,
        species: &str,
        confidence: f32,
    ) -> PredictionBatch {
        PredictionBatch {
            source: source.to_string(),
            start_time: clock_start + Duration::seconds(offset_secs),
            elapsed: StdDuration::from_millis(42),
            pcm: Arc::new(vec![0u8; 16]),
            results: Arc::new(vec![SpeciesScore {
                species: species.to_string(),
                confidence,
            }]),
        }
    }

    fn drain_tasks(rx: &Receiver<Task>) -> Vec<Task> {
        let mut tasks = Vec::new();
        while let Ok(task) = rx.try_recv() {
            tasks.push(task);
        }
        tasks
    }

    #[test]
    fn test_single_confirmation_produces_log_and_persist_tasks() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        settings.output.sqlite.enabled = true;

        let datastore = Arc::new(FakeDatastore::new());
        let processor = Processor::new(settings, clock.clone())
            .unwrap()
            .with_datastore(datastore);

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        assert_eq!(processor.pending_count(), 1);

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);

        // Before the deadline nothing moves.
        clock.advance(Duration::seconds(14));
        processor.flush_pending(&tx).unwrap();
        assert_eq!(processor.pending_count(), 1);
        assert!(drain_tasks(&rx).is_empty());

        clock.advance(Duration::seconds(2));
        processor.flush_pending(&tx).unwrap();

        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].action.name(), "log");
        assert_eq!(tasks[1].action.name(), "persist");
        assert_eq!(processor.pending_count(), 0);
        assert_eq!(processor.metrics().detections_total(), 1);
    }

    #[test]
    fn test_below_threshold_prediction_never_confirms() {
        let clock = start_clock();
        let t0 = clock.now();
        let processor = Processor::new(quiet_settings(), clock.clone()).unwrap();

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.70));
        assert_eq!(processor.pending_count(), 0);

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();
        assert!(drain_tasks(&rx).is_empty());
        assert_eq!(processor.metrics().detections_total(), 0);
    }

    #[test]
    fn test_privacy_veto_discards_pending_detection() {
        let clock = start_clock();
        let t0 = clock.now();
        let processor = Processor::new(quiet_settings(), clock.clone()).unwrap();

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        assert_eq!(processor.pending_count(), 1);

        // A human vocalization from the same source after the first
        // detection poisons it.
        processor.process_batch(&batch(t0, 5, "Homo sapiens_Human vocal", 0.9));
        assert_eq!(processor.pending_count(), 1);

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();

        assert!(drain_tasks(&rx).is_empty());
        assert_eq!(processor.pending_count(), 0);
        assert_eq!(processor.metrics().detections_total(), 0);
    }

    #[test]
    fn test_privacy_veto_ignores_other_sources() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        let processor = Processor::new(settings, clock.clone()).unwrap();

        processor.process_batch(&batch_from(t0, 0, "card0", "Turdus merula_Common Blackbird", 0.92));
        processor.process_batch(&batch_from(t0, 5, "card1", "Homo sapiens_Human vocal", 0.9));

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();
        assert_eq!(drain_tasks(&rx).len(), 1);
    }

    #[test]
    fn test_confidence_replacement_keeps_first_begin_time() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        let processor = Processor::new(settings, clock.clone()).unwrap();

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.85));
        clock.advance(Duration::seconds(2));
        processor.process_batch(&batch(t0, 2, "Turdus merula_Common Blackbird", 0.95));
        assert_eq!(processor.pending_count(), 1);

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(14));
        processor.flush_pending(&tx).unwrap();

        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 1);
        let note = &tasks[0].detection.note;
        assert!((note.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(note.begin_time, t0);
    }

    #[test]
    fn test_dynamic_escalation_lowers_effective_floor() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.dynamic_threshold.enabled = true;
        let processor = Processor::new(settings, clock.clone()).unwrap();

        // 0.93 passes the 0.8 base floor and escalates to level 1
        // (effective floor 0.6).
        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.93));
        // 0.65 would fail the base floor but passes the lowered one.
        processor.process_batch(&batch(t0, 3, "Turdus merula_Common Blackbird", 0.65));

        let pending = processor.pending_map().lock().unwrap();
        assert_eq!(pending.get("common blackbird").map(|e| e.count), Some(2));
    }

    #[test]
    fn test_dog_bark_veto() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        settings.realtime.dog_bark_filter.enabled = true;
        settings.realtime.dog_bark_filter.species = vec!["Common Blackbird".to_string()];
        let processor = Processor::new(settings, clock.clone()).unwrap();

        processor.process_batch(&batch(t0, 0, "Canis familiaris_Dog", 0.8));
        processor.process_batch(&batch(t0, 2, "Turdus merula_Common Blackbird", 0.92));

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(18));
        processor.flush_pending(&tx).unwrap();
        assert!(drain_tasks(&rx).is_empty());
    }

    #[test]
    fn test_allow_list_excludes_species() {
        let clock = start_clock();
        let t0 = clock.now();
        let processor = Processor::new(quiet_settings(), clock.clone())
            .unwrap()
            .with_allow_list(vec!["Erithacus rubecula_European Robin".to_string()], None);

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        assert_eq!(processor.pending_count(), 0);

        processor.process_batch(&batch(t0, 0, "Erithacus rubecula_European Robin", 0.92));
        assert_eq!(processor.pending_count(), 1);
    }

    #[test]
    fn test_min_count_gate_discards_lone_window_at_high_overlap() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        settings.detector.overlap = 2.0; // requires 3 matching windows
        let processor = Processor::new(settings, clock.clone()).unwrap();

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        processor.process_batch(&batch(t0, 1, "Turdus merula_Common Blackbird", 0.91));

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();
        assert!(drain_tasks(&rx).is_empty());
        assert_eq!(processor.pending_count(), 0);
    }

    #[test]
    fn test_rate_limiting_suppresses_second_detection_actions() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.output.sqlite.enabled = true;

        let datastore = Arc::new(FakeDatastore::new());
        let processor = Processor::new(settings, clock.clone())
            .unwrap()
            .with_datastore(datastore.clone());

        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();
        for task in drain_tasks(&rx) {
            task.action.execute(&task.detection).unwrap();
        }
        assert_eq!(datastore.saved_count(), 1);

        // Second confirmation of the same species ten seconds later: the
        // persist task is planned but the tracker denies the save.
        processor.process_batch(&batch(t0, 10, "Turdus merula_Common Blackbird", 0.9));
        clock.advance(Duration::seconds(10));
        processor.flush_pending(&tx).unwrap();
        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 1);
        for task in tasks {
            task.action.execute(&task.detection).unwrap();
        }
        assert_eq!(datastore.saved_count(), 1);
    }

    #[test]
    fn test_failed_save_returns_error_and_skips_clip_export() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.output.sqlite.enabled = true;
        settings.realtime.audio_export.enabled = true;

        let datastore = Arc::new(FakeDatastore {
            saved: Mutex::new(Vec::new()),
            fail: true,
        });
        let processor = Processor::new(settings, clock.clone())
            .unwrap()
            .with_datastore(datastore);

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();

        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 1);
        // The save error propagates out of the action without reaching the
        // clip export stage.
        assert!(tasks[0].action.execute(&tasks[0].detection).is_err());
    }

    #[test]
    fn test_allow_list_refresh_planned_once_per_day() {
        let clock = start_clock();
        let t0 = clock.now();
        let log_dir = tempfile::tempdir().unwrap();
        let mut settings = quiet_settings();
        settings.realtime.log.enabled = true;
        settings.realtime.log.path = log_dir
            .path()
            .join("detections.txt")
            .to_string_lossy()
            .to_string();

        let provider = Arc::new(FakeRangeProvider {
            calls: AtomicU32::new(0),
        });
        let processor = Processor::new(settings, clock.clone())
            .unwrap()
            .with_range_provider(provider.clone());

        processor.process_batch(&batch(t0, 0, "Turdus merula_Common Blackbird", 0.92));
        let (tx, rx) = bounded(TASK_QUEUE_CAPACITY);
        clock.advance(Duration::seconds(16));
        processor.flush_pending(&tx).unwrap();

        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].action.name(), "refresh-allow-list");
        for task in &tasks {
            task.action.execute(&task.detection).unwrap();
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // Same day: no further refresh is planned.
        processor.process_batch(&batch(t0, 20, "Turdus merula_Common Blackbird", 0.92));
        clock.advance(Duration::seconds(20));
        processor.flush_pending(&tx).unwrap();
        let tasks = drain_tasks(&rx);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].action.name(), "log");
    }

    #[test]
    fn test_pipeline_spawn_and_shutdown() {
        let clock = start_clock();
        let t0 = clock.now();
        let mut settings = quiet_settings();
        settings.output.sqlite.enabled = true;

        let datastore = Arc::new(FakeDatastore::new());
        let processor = Processor::new(settings, clock.clone())
            .unwrap()
            .with_datastore(datastore.clone());

        let (tx, rx) = ingress_channel(crate::constants::DEFAULT_INGRESS_CAPACITY);
        let pipeline = processor.spawn(rx).unwrap();

        tx.send(batch(t0, 0, "Turdus merula_Common Blackbird", 0.92))
            .unwrap();
        clock.advance(Duration::seconds(16));

        // Wait for a real flusher tick to promote and a worker to save.
        let deadline = std::time::Instant::now() + StdDuration::from_secs(5);
        while datastore.saved_count() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(StdDuration::from_millis(50));
        }
        assert_eq!(datastore.saved_count(), 1);
        assert_eq!(pipeline.processor().metrics().detections_total(), 1);

        drop(tx);
        pipeline.join().unwrap();
    }
}
