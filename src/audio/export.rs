//! Audio clip export.
//!
//! Exported clips are written under the configured export directory using
//! the relative clip name generated at detection time. WAV is written
//! directly; other encodings go through ffmpeg with PCM on stdin.

use crate::config::{ClipExportConfig, ClipFormat};
use crate::constants::pcm;
use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Write a detection clip under the export directory.
///
/// Creates intermediate directories (`YYYY/MM/`) as needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the encoding
/// fails.
pub fn export_clip(pcm_data: &[u8], clip_name: &str, config: &ClipExportConfig) -> Result<()> {
    let output_path = config.path.join(clip_name);

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::ClipDirCreate {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    match config.format {
        ClipFormat::Wav => save_pcm_to_wav(&output_path, pcm_data)?,
        _ => export_with_ffmpeg(pcm_data, &output_path, config)?,
    }

    debug!("Saved audio clip to {}", output_path.display());
    Ok(())
}

/// Write raw 16-bit mono PCM to a WAV file.
///
/// # Errors
///
/// Returns [`Error::WavWrite`] if the file cannot be written.
pub fn save_pcm_to_wav(path: &Path, pcm_data: &[u8]) -> Result<()> {
    let spec = WavSpec {
        channels: pcm::CHANNELS,
        sample_rate: pcm::SAMPLE_RATE,
        bits_per_sample: pcm::BIT_DEPTH,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| Error::WavWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    for chunk in pcm_data.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        writer.write_sample(sample).map_err(|e| Error::WavWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    writer.finalize().map_err(|e| Error::WavWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Encode raw PCM to the configured format by piping it through ffmpeg.
///
/// # Errors
///
/// Returns an error if ffmpeg cannot be spawned, its stdin cannot be
/// written, or it exits with a non-zero status.
pub fn export_with_ffmpeg(pcm_data: &[u8], path: &Path, config: &ClipExportConfig) -> Result<()> {
    let mut child = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-f")
        .arg("s16le")
        .arg("-ar")
        .arg(pcm::SAMPLE_RATE.to_string())
        .arg("-ac")
        .arg(pcm::CHANNELS.to_string())
        .arg("-i")
        .arg("-")
        .arg("-y")
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(pcm_data)?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(Error::ClipEncode {
            path: path.to_path_buf(),
            output: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    debug!(
        "ffmpeg encoded {} bytes of PCM to {} ({})",
        pcm_data.len(),
        path.display(),
        config.format
    );
    Ok(())
}
