//! Configuration type definitions.

use crate::constants::{defaults, dynamic_threshold};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Enable verbose pipeline diagnostics.
    pub debug: bool,

    /// Classifier-facing settings.
    pub detector: DetectorConfig,

    /// Real-time pipeline settings.
    pub realtime: RealtimeConfig,

    /// Persistent storage settings.
    pub output: StorageConfig,
}

impl Settings {
    /// Custom confidence threshold for a species, if configured.
    ///
    /// `species_lower` is the lowercased common name.
    #[must_use]
    pub fn custom_threshold(&self, species_lower: &str) -> Option<f32> {
        self.realtime
            .species
            .config
            .get(species_lower)
            .and_then(|s| s.threshold)
    }

    /// Custom action list for a species, if configured.
    #[must_use]
    pub fn custom_actions(&self, species_lower: &str) -> Option<&[ActionConfig]> {
        self.realtime
            .species
            .config
            .get(species_lower)
            .map(|s| s.actions.as_slice())
    }
}

/// Classifier settings the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Global confidence threshold.
    pub threshold: f32,

    /// Model sigmoid sensitivity.
    pub sensitivity: f32,

    /// Window overlap in seconds (0.0-2.9).
    pub overlap: f32,

    /// Range filter settings.
    pub range_filter: RangeFilterConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::THRESHOLD,
            sensitivity: defaults::SENSITIVITY,
            overlap: defaults::OVERLAP,
            range_filter: RangeFilterConfig::default(),
        }
    }
}

/// Location-based species filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeFilterConfig {
    /// Minimum occurrence score for a species to stay on the list.
    pub threshold: f32,
}

impl Default for RangeFilterConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::RANGE_FILTER_THRESHOLD,
        }
    }
}

/// Real-time pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Event tracker suppression interval in seconds.
    pub interval: u64,

    /// Human vocalization privacy filter.
    pub privacy_filter: PrivacyFilterConfig,

    /// Dog bark false-positive filter.
    pub dog_bark_filter: DogBarkFilterConfig,

    /// Species-adaptive confidence floors.
    pub dynamic_threshold: DynamicThresholdConfig,

    /// Per-species overrides.
    pub species: SpeciesConfig,

    /// Detection log file.
    pub log: DetectionLogConfig,

    /// Remote upload integration.
    pub upload: UploadConfig,

    /// Message-bus integration.
    pub bus: BusConfig,

    /// Audio clip export.
    pub audio_export: ClipExportConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            interval: defaults::INTERVAL_SECS,
            privacy_filter: PrivacyFilterConfig::default(),
            dog_bark_filter: DogBarkFilterConfig::default(),
            dynamic_threshold: DynamicThresholdConfig::default(),
            species: SpeciesConfig::default(),
            log: DetectionLogConfig::default(),
            upload: UploadConfig::default(),
            bus: BusConfig::default(),
            audio_export: ClipExportConfig::default(),
        }
    }
}

/// Human vocalization privacy filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyFilterConfig {
    /// Whether the filter is active.
    pub enabled: bool,

    /// Confidence above which a human detection marks the source.
    pub confidence: f32,
}

impl Default for PrivacyFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence: defaults::PRIVACY_CONFIDENCE,
        }
    }
}

/// Dog bark false-positive filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DogBarkFilterConfig {
    /// Whether the filter is active.
    pub enabled: bool,

    /// Confidence above which a dog detection marks the source.
    pub confidence: f32,

    /// Minutes a bark is remembered per source.
    pub remember: i64,

    /// Species whose detections are suppressed after a recent bark.
    pub species: Vec<String>,

    /// Log filter decisions.
    pub debug: bool,
}

impl Default for DogBarkFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confidence: defaults::DOG_BARK_CONFIDENCE,
            remember: defaults::DOG_BARK_REMEMBER_MIN,
            species: Vec::new(),
            debug: false,
        }
    }
}

/// Species-adaptive confidence floor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicThresholdConfig {
    /// Whether dynamic thresholds are active.
    pub enabled: bool,

    /// Confidence at or above which a hit escalates the level.
    pub trigger: f32,

    /// Hard lower bound for any lowered floor.
    pub min: f32,

    /// Hours an entry stays valid without further high-confidence hits.
    pub valid_hours: i64,
}

impl Default for DynamicThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: dynamic_threshold::DEFAULT_TRIGGER,
            min: dynamic_threshold::DEFAULT_MIN_FLOOR,
            valid_hours: dynamic_threshold::DEFAULT_VALID_HOURS,
        }
    }
}

/// Per-species overrides, keyed by lowercased common name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    /// Override table.
    pub config: HashMap<String, SpeciesSettings>,
}

/// Overrides for a single species.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesSettings {
    /// Custom confidence threshold.
    pub threshold: Option<f32>,

    /// Custom actions replacing the default chain.
    pub actions: Vec<ActionConfig>,
}

/// A single configured custom action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// What kind of action to run.
    #[serde(rename = "type")]
    pub action_type: ActionType,

    /// Command to execute (for [`ActionType::ExecuteCommand`]).
    #[serde(default)]
    pub command: Option<PathBuf>,

    /// Parameters bound from the detection, `name` or `name=literal`.
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Kinds of configurable custom actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    /// Run an external command with bound parameters.
    ExecuteCommand,
    /// Send a notification (recognized, not yet wired to a channel).
    SendNotification,
}

/// Detection log file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionLogConfig {
    /// Whether the log action is active.
    pub enabled: bool,

    /// Log file path.
    pub path: String,
}

impl Default for DetectionLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: defaults::LOG_PATH.to_string(),
        }
    }
}

/// Remote upload integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Whether the upload action is active.
    pub enabled: bool,

    /// Minimum confidence for an upload.
    pub threshold: f32,

    /// Station identifier at the remote service.
    pub id: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: defaults::UPLOAD_THRESHOLD,
            id: String::new(),
        }
    }
}

/// Message-bus integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Whether the publish action is active.
    pub enabled: bool,

    /// Broker URL.
    pub broker: String,

    /// Topic detections are published to.
    pub topic: String,

    /// Broker username.
    pub username: String,

    /// Broker password.
    pub password: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker: defaults::BUS_BROKER.to_string(),
            topic: defaults::BUS_TOPIC.to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Audio clip export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipExportConfig {
    /// Whether clips are exported alongside database saves.
    pub enabled: bool,

    /// Output encoding.
    #[serde(rename = "type")]
    pub format: ClipFormat,

    /// Export directory.
    pub path: PathBuf,

    /// Clip retention settings (consumed by the disk manager, recognized here).
    pub retention: RetentionConfig,
}

impl Default for ClipExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ClipFormat::Wav,
            path: PathBuf::from(defaults::CLIP_PATH),
            retention: RetentionConfig::default(),
        }
    }
}

/// Supported clip encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    /// Uncompressed WAV.
    #[default]
    Wav,
    /// MP3 via ffmpeg.
    Mp3,
    /// FLAC via ffmpeg.
    Flac,
    /// AAC via ffmpeg.
    Aac,
    /// Opus via ffmpeg.
    Opus,
}

impl ClipFormat {
    /// File extension for this encoding.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::Opus => "opus",
        }
    }
}

impl std::fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Clip retention policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Cleanup policy.
    pub policy: RetentionPolicy,

    /// Maximum clip age, e.g. `"30d"` (age policy).
    pub max_age: String,

    /// Maximum disk usage, e.g. `"80%"` (usage policy).
    pub max_usage: String,

    /// Clips always kept per species.
    pub min_clips: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::Usage,
            max_age: "30d".to_string(),
            max_usage: "80%".to_string(),
            min_clips: 10,
        }
    }
}

/// Clip cleanup policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// No cleanup.
    None,
    /// Delete clips older than `max_age`.
    Age,
    /// Delete oldest clips above `max_usage`.
    #[default]
    Usage,
}

/// Persistent storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite backend.
    pub sqlite: SqliteConfig,

    /// MySQL backend.
    pub mysql: MysqlConfig,
}

impl StorageConfig {
    /// Whether any storage backend is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.sqlite.enabled || self.mysql.enabled
    }
}

/// SQLite backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Whether the backend is enabled.
    pub enabled: bool,

    /// Database file path.
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(crate::constants::defaults::SQLITE_PATH),
        }
    }
}

/// MySQL backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MysqlConfig {
    /// Whether the backend is enabled.
    pub enabled: bool,

    /// Server host.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub username: String,

    /// Password.
    pub password: String,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 3306,
            database: "birdwatch".to_string(),
            username: "birdwatch".to_string(),
            password: String::new(),
        }
    }
}
