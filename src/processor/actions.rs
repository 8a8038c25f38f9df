//! Per-detection actions and the action planner.
//!
//! Actions form a closed set of variants so the fan-out surface stays
//! auditable. The planner maps a confirmed detection to an ordered action
//! list; workers execute the actions in parallel.

use crate::audio::{export_clip, ClipBuffer};
use crate::clock::SharedClock;
use crate::config::{ActionType, ClipExportConfig, DetectionLogConfig, Settings};
use crate::constants::{CLIP_DURATION_SECS, PUBLISH_TIMEOUT_SECS};
use crate::datastore::Datastore;
use crate::detection::Detection;
use crate::error::{Error, Result};
use crate::integrations::{ImageProvider, MessageBus, NotePayload, RangeFilterState, RangeProvider, UploadClient};
use crate::observation::log_note_to_file;
use crate::processor::event_tracker::{EventKind, EventTracker};
use crate::processor::execute::{run_command, CommandParam};
use crate::processor::Processor;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One side effect executed for a confirmed detection.
#[derive(Debug)]
pub(crate) enum Action {
    /// Append the detection to the log file.
    Log(LogAction),
    /// Save the detection to the datastore (and export its clip).
    Persist(PersistAction),
    /// Upload the detection to the remote sharing service.
    Upload(UploadAction),
    /// Publish the detection on the message bus.
    Publish(PublishAction),
    /// Write an audio clip to the export directory.
    ExportClip(ExportClipAction),
    /// Run a configured external command.
    RunCommand(CommandAction),
    /// Refresh the daily species allow-list.
    RefreshAllowList(RefreshAllowListAction),
}

impl Action {
    /// Execute this action for a detection.
    pub(crate) fn execute(&self, detection: &Detection) -> Result<()> {
        match self {
            Self::Log(a) => a.execute(detection),
            Self::Persist(a) => a.execute(detection),
            Self::Upload(a) => a.execute(detection),
            Self::Publish(a) => a.execute(detection),
            Self::ExportClip(a) => a.execute(),
            Self::RunCommand(a) => a.execute(detection),
            Self::RefreshAllowList(a) => a.execute(),
        }
    }

    /// Stable name for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Persist(_) => "persist",
            Self::Upload(_) => "upload",
            Self::Publish(_) => "publish",
            Self::ExportClip(_) => "export-clip",
            Self::RunCommand(_) => "run-command",
            Self::RefreshAllowList(_) => "refresh-allow-list",
        }
    }
}

/// Append the detection to the log file and echo it at info level.
pub(crate) struct LogAction {
    pub config: DetectionLogConfig,
    pub tracker: Arc<EventTracker>,
}

impl LogAction {
    fn execute(&self, detection: &Detection) -> Result<()> {
        let note = &detection.note;
        if !self.tracker.track_event(&note.common_name, EventKind::LogToFile) {
            return Ok(());
        }

        if let Err(e) = log_note_to_file(&self.config, note) {
            warn!("Failed to log note to file: {e}");
        }
        info!("{} {} {:.2}", note.time, note.common_name, note.confidence);
        Ok(())
    }
}

/// Save the detection to the datastore; on success, export its audio clip.
pub(crate) struct PersistAction {
    pub export: ClipExportConfig,
    pub tracker: Arc<EventTracker>,
    pub datastore: Arc<dyn Datastore>,
    pub clip_buffer: Option<Arc<dyn ClipBuffer>>,
}

impl PersistAction {
    fn execute(&self, detection: &Detection) -> Result<()> {
        let note = &detection.note;
        if !self.tracker.track_event(&note.common_name, EventKind::DatabaseSave) {
            return Ok(());
        }

        if let Err(e) = self.datastore.save(note, &detection.results) {
            error!("Failed to save note to datastore: {e}");
            return Err(e);
        }

        // A failed save already returned: the clip export depends on the
        // durable record existing.
        if self.export.enabled {
            let Some(clip_buffer) = &self.clip_buffer else {
                return Ok(());
            };

            let pcm_data =
                match clip_buffer.read_segment(&note.source, note.begin_time, CLIP_DURATION_SECS) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to read audio segment from buffer: {e}");
                        return Err(e);
                    }
                };

            let export = Action::ExportClip(ExportClipAction {
                config: self.export.clone(),
                clip_name: note.clip_name.clone(),
                pcm_data,
            });
            if let Err(e) = export.execute(detection) {
                error!("Failed to save audio clip: {e}");
                return Err(e);
            }
        }

        Ok(())
    }
}

/// Write a PCM buffer to the clip export directory.
pub(crate) struct ExportClipAction {
    pub config: ClipExportConfig,
    pub clip_name: String,
    pub pcm_data: Vec<u8>,
}

impl ExportClipAction {
    fn execute(&self) -> Result<()> {
        export_clip(&self.pcm_data, &self.clip_name, &self.config)
    }
}

/// Upload the detection and its PCM to the remote sharing service.
pub(crate) struct UploadAction {
    pub tracker: Arc<EventTracker>,
    pub client: Arc<dyn UploadClient>,
}

impl UploadAction {
    fn execute(&self, detection: &Detection) -> Result<()> {
        let note = &detection.note;
        if !self.tracker.track_event(&note.common_name, EventKind::RemoteUpload) {
            return Ok(());
        }

        if let Err(e) = self.client.publish(note, &detection.pcm) {
            error!("Failed to upload {}: {e}", note.clip_name);
            return Err(e);
        }
        Ok(())
    }
}

/// Publish the detection as JSON on the message bus.
pub(crate) struct PublishAction {
    pub topic: String,
    pub tracker: Arc<EventTracker>,
    pub client: Arc<dyn MessageBus>,
    pub images: Option<Arc<dyn ImageProvider>>,
}

impl PublishAction {
    fn execute(&self, detection: &Detection) -> Result<()> {
        let note = &detection.note;
        if !self.tracker.track_event(&note.common_name, EventKind::BusPublish) {
            return Ok(());
        }

        if !self.client.is_connected() {
            info!("Message-bus client is not connected, skipping publish");
            return Ok(());
        }

        if self.topic.is_empty() {
            return Err(Error::BusTopicMissing);
        }

        let image = self
            .images
            .as_ref()
            .and_then(|provider| provider.get(&note.scientific_name));
        let payload = NotePayload { note, image };
        let json = serde_json::to_string(&payload)
            .map_err(|e| Error::PayloadSerialize { source: e })?;

        self.client
            .publish(&self.topic, &json, Duration::from_secs(PUBLISH_TIMEOUT_SECS))
    }
}

/// Run a configured external command with bound parameters.
pub(crate) struct CommandAction {
    pub command: PathBuf,
    pub params: Vec<CommandParam>,
    pub tracker: Arc<EventTracker>,
}

impl CommandAction {
    fn execute(&self, detection: &Detection) -> Result<()> {
        let note = &detection.note;
        if !self.tracker.track_event(&note.common_name, EventKind::CommandExec) {
            return Ok(());
        }

        run_command(&self.command, &self.params, note)?;
        Ok(())
    }
}

/// Refresh the daily species allow-list from the range provider.
pub(crate) struct RefreshAllowListAction {
    pub provider: Arc<dyn RangeProvider>,
    pub state: Arc<RwLock<RangeFilterState>>,
    pub clock: SharedClock,
}

impl RefreshAllowListAction {
    fn execute(&self) -> Result<()> {
        let today = self.clock.now().date_naive();

        // Another worker may have refreshed between planning and execution.
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.last_updated().is_some_and(|d| d >= today) {
                return Ok(());
            }
        }

        let scores = self.provider.probable_species(today, 0.0)?;
        let count = scores.len();
        let labels = scores.into_iter().map(|s| s.species);

        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(labels, today);
        info!("Updated species range filter: {count} species for {today}");
        Ok(())
    }
}

impl std::fmt::Debug for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogAction").finish_non_exhaustive()
    }
}
impl std::fmt::Debug for PersistAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistAction").finish_non_exhaustive()
    }
}
impl std::fmt::Debug for ExportClipAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportClipAction")
            .field("clip_name", &self.clip_name)
            .finish_non_exhaustive()
    }
}
impl std::fmt::Debug for UploadAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadAction").finish_non_exhaustive()
    }
}
impl std::fmt::Debug for PublishAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishAction")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
impl std::fmt::Debug for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandAction")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}
impl std::fmt::Debug for RefreshAllowListAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshAllowListAction").finish_non_exhaustive()
    }
}

impl Processor {
    /// Map a confirmed detection to its ordered action list.
    ///
    /// Custom per-species actions replace the default chain when any are
    /// configured; otherwise the default chain applies: log, persist,
    /// upload, publish, allow-list refresh.
    pub(crate) fn actions_for(&self, detection: &Detection) -> Vec<Action> {
        let species_lower = detection.note.common_name.to_lowercase();

        if let Some(custom) = self.settings().custom_actions(&species_lower) {
            let mut actions = Vec::new();
            for config in custom {
                match config.action_type {
                    ActionType::ExecuteCommand => {
                        let Some(command) = &config.command else {
                            continue;
                        };
                        if config.parameters.is_empty() {
                            continue;
                        }
                        actions.push(Action::RunCommand(CommandAction {
                            command: command.clone(),
                            params: config
                                .parameters
                                .iter()
                                .map(|p| CommandParam::parse(p))
                                .collect(),
                            tracker: self.event_tracker(),
                        }));
                    }
                    ActionType::SendNotification => {
                        debug!(
                            "SendNotification action for {species_lower} has no delivery channel, skipping"
                        );
                    }
                }
            }
            if !actions.is_empty() {
                return actions;
            }
        }

        self.default_actions(detection)
    }

    /// The default action chain, each link gated on config and client
    /// availability.
    ///
    /// Order matters: log first (cheapest, always visible), persist second
    /// (durable record before network fan-out), then the network actions.
    fn default_actions(&self, detection: &Detection) -> Vec<Action> {
        let settings: &Settings = self.settings();
        let mut actions = Vec::new();

        if settings.realtime.log.enabled {
            actions.push(Action::Log(LogAction {
                config: settings.realtime.log.clone(),
                tracker: self.event_tracker(),
            }));
        }

        if settings.output.any_enabled() {
            if let Some(datastore) = self.datastore() {
                actions.push(Action::Persist(PersistAction {
                    export: settings.realtime.audio_export.clone(),
                    tracker: self.event_tracker(),
                    datastore,
                    clip_buffer: self.clip_buffer(),
                }));
            }
        }

        if settings.realtime.upload.enabled {
            if let Some(client) = self.upload_client() {
                if detection.note.confidence >= settings.realtime.upload.threshold {
                    actions.push(Action::Upload(UploadAction {
                        tracker: self.event_tracker(),
                        client,
                    }));
                } else if settings.debug {
                    debug!(
                        "Skipping upload for {}: confidence {:.2} below threshold {:.2}",
                        detection.note.common_name,
                        detection.note.confidence,
                        settings.realtime.upload.threshold
                    );
                }
            }
        }

        if settings.realtime.bus.enabled {
            if let Some(client) = self.bus_client() {
                actions.push(Action::Publish(PublishAction {
                    topic: settings.realtime.bus.topic.clone(),
                    tracker: self.event_tracker(),
                    client,
                    images: self.image_provider(),
                }));
            }
        }

        if let Some(provider) = self.range_provider() {
            let today = self.clock().now().date_naive();
            let stale = self
                .range_filter()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .last_updated()
                .is_none_or(|d| d < today);
            if stale {
                info!("Scheduling species range filter update");
                actions.push(Action::RefreshAllowList(RefreshAllowListAction {
                    provider,
                    state: self.range_filter(),
                    clock: self.clock(),
                }));
            }
        }

        actions
    }
}
