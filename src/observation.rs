//! Observation records built from classifier predictions.
//!
//! A [`Note`] is the durable record of a single detection: it is what gets
//! logged, persisted, uploaded, and published. Species labels arrive from
//! the classifier as `"<Scientific name>_<Common name>"` tags.

use crate::config::DetectionLogConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Split a classifier species tag into scientific and common names.
///
/// # Errors
///
/// Returns [`Error::SpeciesParse`] when the tag has no `_` separator or
/// either half is empty.
pub fn parse_species_tag(tag: &str) -> Result<(String, String)> {
    let (scientific, common) = tag.split_once('_').ok_or_else(|| Error::SpeciesParse {
        tag: tag.to_string(),
    })?;

    if scientific.is_empty() || common.is_empty() {
        return Err(Error::SpeciesParse {
            tag: tag.to_string(),
        });
    }

    Ok((scientific.to_string(), common.to_string()))
}

/// Build the relative clip path for a detection.
///
/// Format: `YYYY/MM/<lowercased_scientific_with_underscores>_<conf%>p_<YYYYMMDDTHHMMSSZ>.<ext>`
/// with forward slashes, suitable for both filesystem paths and web URLs.
/// Pure in its inputs; callers supply `now` from the injected clock.
#[must_use]
pub fn clip_name(scientific: &str, confidence: f32, now: DateTime<Utc>, extension: &str) -> String {
    let formatted_name = scientific.to_lowercase().replace(' ', "_");

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let confidence_pct = (confidence * 100.0).round() as u32;

    format!(
        "{}/{}/{}_{confidence_pct}p_{}.{extension}",
        now.format("%Y"),
        now.format("%m"),
        formatted_name,
        now.format("%Y%m%dT%H%M%SZ"),
    )
}

/// A single observation of a species, ready for persistence and fan-out.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    /// Detection date, `YYYY-MM-DD`.
    pub date: String,
    /// Detection time of day, `HH:MM:SS`.
    pub time: String,
    /// Audio source the detection came from (capture device or stream URL).
    pub source: String,
    /// Start of the detection window.
    pub begin_time: DateTime<Utc>,
    /// End of the detection window.
    pub end_time: DateTime<Utc>,
    /// Scientific species name.
    pub scientific_name: String,
    /// Common species name.
    pub common_name: String,
    /// Prediction confidence, 0.0-1.0.
    pub confidence: f32,
    /// Relative path of the exported audio clip.
    pub clip_name: String,
    /// Inference processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl Note {
    /// Build a note for a detection window.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        begin_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        scientific_name: String,
        common_name: String,
        confidence: f32,
        source: String,
        clip_name: String,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            date: begin_time.format("%Y-%m-%d").to_string(),
            time: begin_time.format("%H:%M:%S").to_string(),
            source,
            begin_time,
            end_time,
            scientific_name,
            common_name,
            confidence,
            clip_name,
            processing_time_ms,
        }
    }

    /// Look up a field by name for command parameter binding.
    ///
    /// This is an explicit accessor table rather than reflection: the set of
    /// fields exposed to external commands stays bounded and reviewable.
    /// Names are matched case-insensitively. `confidence` binds as a
    /// percentage.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<String> {
        match name.to_lowercase().as_str() {
            "date" => Some(self.date.clone()),
            "time" => Some(self.time.clone()),
            "source" => Some(self.source.clone()),
            "begintime" => Some(self.begin_time.to_rfc3339()),
            "endtime" => Some(self.end_time.to_rfc3339()),
            "scientificname" => Some(self.scientific_name.clone()),
            "commonname" => Some(self.common_name.clone()),
            "confidence" => Some(format!("{:.0}", self.confidence * 100.0)),
            "clipname" => Some(self.clip_name.clone()),
            "processingtime" => Some(self.processing_time_ms.to_string()),
            _ => None,
        }
    }
}

/// Append a note to the detection log file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn log_note_to_file(config: &DetectionLogConfig, note: &Note) -> Result<()> {
    let path = Path::new(&config.path);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(
        file,
        "{};{};{};{};{:.2}",
        note.date, note.time, note.scientific_name, note.common_name, note.confidence
    )?;

    Ok(())
}
