//! Configuration file loading.

use crate::config::Settings;
use crate::error::{Error, Result};
use std::path::Path;

/// Load settings from a TOML file.
///
/// # Errors
///
/// Returns [`Error::ConfigRead`] if the file cannot be read and
/// [`Error::ConfigParse`] if its contents are not valid TOML.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let settings = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_settings_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
debug = true

[detector]
threshold = 0.75
overlap = 1.5

[realtime]
interval = 30

[realtime.dog_bark_filter]
enabled = true
species = ["European Robin"]

[realtime.species.config."common blackbird"]
threshold = 0.6
"#
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert!(settings.debug);
        assert!((settings.detector.threshold - 0.75).abs() < f32::EPSILON);
        assert!((settings.detector.overlap - 1.5).abs() < f32::EPSILON);
        assert_eq!(settings.realtime.interval, 30);
        assert!(settings.realtime.dog_bark_filter.enabled);
        assert_eq!(settings.realtime.dog_bark_filter.species.len(), 1);
        assert_eq!(settings.custom_threshold("common blackbird"), Some(0.6));
        // Unset sections keep their defaults.
        assert!((settings.realtime.privacy_filter.confidence - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_settings_missing_file() {
        let err = load_settings(Path::new("/nonexistent/birdwatch.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_settings_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();
        let err = load_settings(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
