//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

/// Seconds a pending detection is held before it is considered final and
/// becomes eligible for flushing.
pub const FLUSH_DELAY_SECS: i64 = 15;

/// Flusher sweep cadence in seconds.
pub const FLUSHER_TICK_SECS: u64 = 1;

/// Number of worker threads consuming the action task queue.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Capacity of the bounded action task queue.
///
/// The bound caps memory held by queued tasks; it is not meant to apply
/// backpressure to inference, which has its own ingress bound.
pub const TASK_QUEUE_CAPACITY: usize = 100;

/// Default capacity of the prediction ingress queue.
pub const DEFAULT_INGRESS_CAPACITY: usize = 5;

/// Duration of a single prediction window in seconds.
pub const PREDICTION_WINDOW_SECS: f32 = 3.0;

/// Maximum valid window overlap in seconds.
pub const MAX_OVERLAP_SECS: f32 = 2.9;

/// Seconds of audio read from the capture buffer for an exported clip.
pub const CLIP_DURATION_SECS: u32 = 15;

/// Timeout for a single message-bus publish call in seconds.
pub const PUBLISH_TIMEOUT_SECS: u64 = 10;

/// Audio format of capture-buffer PCM.
pub mod pcm {
    /// Sample rate in Hz.
    pub const SAMPLE_RATE: u32 = 48_000;
    /// Bits per sample.
    pub const BIT_DEPTH: u16 = 16;
    /// Channel count.
    pub const CHANNELS: u16 = 1;
}

/// Dynamic confidence threshold parameters.
pub mod dynamic_threshold {
    /// Confidence at or above which a hit escalates the threshold level.
    pub const DEFAULT_TRIGGER: f32 = 0.90;

    /// Hard lower bound for any dynamically lowered floor.
    pub const DEFAULT_MIN_FLOOR: f32 = 0.20;

    /// Hours an escalated entry stays valid without further high-confidence hits.
    pub const DEFAULT_VALID_HOURS: i64 = 24;

    /// Scale applied to the base floor per escalation level.
    pub const LEVEL_SCALE: [f32; 4] = [1.0, 0.75, 0.5, 0.25];

    /// Highest escalation level.
    pub const MAX_LEVEL: u8 = 3;
}

/// Default configuration values.
pub mod defaults {
    /// Global confidence threshold.
    pub const THRESHOLD: f32 = 0.8;
    /// Model sigmoid sensitivity.
    pub const SENSITIVITY: f32 = 1.0;
    /// Window overlap in seconds.
    pub const OVERLAP: f32 = 0.0;
    /// Event tracker suppression interval in seconds.
    pub const INTERVAL_SECS: u64 = 15;
    /// Privacy filter trigger confidence.
    pub const PRIVACY_CONFIDENCE: f32 = 0.05;
    /// Dog bark filter trigger confidence.
    pub const DOG_BARK_CONFIDENCE: f32 = 0.1;
    /// Minutes a dog bark is remembered per source.
    pub const DOG_BARK_REMEMBER_MIN: i64 = 5;
    /// Remote upload confidence threshold.
    pub const UPLOAD_THRESHOLD: f32 = 0.8;
    /// Message-bus broker URL.
    pub const BUS_BROKER: &str = "tcp://localhost:1883";
    /// Message-bus topic.
    pub const BUS_TOPIC: &str = "birdwatch";
    /// Detection log file path.
    pub const LOG_PATH: &str = "detections.txt";
    /// Audio clip export directory.
    pub const CLIP_PATH: &str = "clips/";
    /// Range filter score floor.
    pub const RANGE_FILTER_THRESHOLD: f32 = 0.01;
    /// SQLite database path.
    pub const SQLITE_PATH: &str = "birdwatch.db";
}
