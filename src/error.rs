//! Error types for birdwatch.

/// Result type alias for birdwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for birdwatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Species tag could not be split into scientific and common names.
    #[error("unparseable species tag: {tag}")]
    SpeciesParse {
        /// The offending tag.
        tag: String,
    },

    /// Command parameter name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid parameter name: {name}")]
    InvalidParameterName {
        /// The offending parameter name.
        name: String,
    },

    /// Command path is not absolute.
    #[error("command must use absolute path: {path}")]
    CommandNotAbsolute {
        /// The offending command path.
        path: std::path::PathBuf,
    },

    /// Command file does not exist or cannot be inspected.
    #[error("command not found: {path}")]
    CommandNotFound {
        /// The offending command path.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Command file is missing the executable bit.
    #[error("command is not executable: {path}")]
    CommandNotExecutable {
        /// The offending command path.
        path: std::path::PathBuf,
    },

    /// External command exited with a non-zero status.
    #[error("command '{command}' failed: {output}")]
    CommandFailed {
        /// The command that was executed.
        command: std::path::PathBuf,
        /// Combined stdout/stderr of the failed run.
        output: String,
    },

    /// Datastore rejected a save.
    #[error("failed to save detection to datastore: {message}")]
    DatastoreSave {
        /// Description of the save failure.
        message: String,
    },

    /// Remote upload failed.
    #[error("remote upload failed: {message}")]
    Upload {
        /// Description of the upload failure.
        message: String,
    },

    /// Message-bus publish failed.
    #[error("message-bus publish failed: {message}")]
    BusPublish {
        /// Description of the publish failure.
        message: String,
    },

    /// Message-bus topic is not configured.
    #[error("message-bus topic is not specified")]
    BusTopicMissing,

    /// Failed to serialize a bus payload.
    #[error("failed to serialize bus payload")]
    PayloadSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read an audio segment from a capture buffer.
    #[error("failed to read audio segment from buffer: {message}")]
    ClipRead {
        /// Description of the read failure.
        message: String,
    },

    /// Failed to create the output directory for an audio clip.
    #[error("failed to create clip directory '{path}'")]
    ClipDirCreate {
        /// Path to the clip directory.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a WAV file.
    #[error("failed to write WAV file '{path}'")]
    WavWrite {
        /// Path to the WAV file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: hound::Error,
    },

    /// ffmpeg encoding failed.
    #[error("ffmpeg export to '{path}' failed: {output}")]
    ClipEncode {
        /// Path to the output clip.
        path: std::path::PathBuf,
        /// Captured ffmpeg stderr.
        output: String,
    },

    /// Range filter refresh failed.
    #[error("failed to update range filter species list: {message}")]
    RangeFilterUpdate {
        /// Description of the refresh failure.
        message: String,
    },

    /// Action queue closed while the pipeline was still producing tasks.
    #[error("action task queue closed while detections were pending")]
    TaskQueueClosed,
}
