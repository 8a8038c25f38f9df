//! Capture-buffer contract and clip export.

mod export;

pub use export::{export_clip, export_with_ffmpeg, save_pcm_to_wav};

use crate::error::Result;
use chrono::{DateTime, Utc};

/// Rolling capture buffer the clip exporter reads finished detections from.
///
/// The audio capture subsystem owns the ring buffers; the pipeline only
/// needs to read a finished segment back out by source and start time.
pub trait ClipBuffer: Send + Sync {
    /// Read `duration_secs` of PCM from `source` starting at `begin_time`.
    ///
    /// # Errors
    ///
    /// Returns an error when the requested window is no longer (or not yet)
    /// available in the buffer.
    fn read_segment(
        &self,
        source: &str,
        begin_time: DateTime<Utc>,
        duration_secs: u32,
    ) -> Result<Vec<u8>>;
}
