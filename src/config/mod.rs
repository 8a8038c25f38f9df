//! Pipeline configuration.

mod file;
mod types;
mod validate;

pub use file::load_settings;
pub use types::{
    ActionConfig, ActionType, BusConfig, ClipExportConfig, ClipFormat, DetectionLogConfig,
    DetectorConfig, DogBarkFilterConfig, DynamicThresholdConfig, MysqlConfig, PrivacyFilterConfig,
    RangeFilterConfig, RealtimeConfig, RetentionConfig, RetentionPolicy, Settings, SpeciesConfig,
    SpeciesSettings, SqliteConfig, StorageConfig, UploadConfig,
};
pub use validate::validate_settings;
