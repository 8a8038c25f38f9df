//! Startup configuration validation.
//!
//! Invalid configuration refuses to run; nothing here is recoverable at
//! pipeline runtime.

use crate::config::{ActionType, Settings};
use crate::constants::MAX_OVERLAP_SECS;
use crate::error::{Error, Result};
use crate::processor::validate_command_path;

fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::ConfigValidation {
            message: format!("{name} must be within 0.0-1.0, got {value}"),
        });
    }
    Ok(())
}

/// Validate settings before the pipeline starts.
///
/// # Errors
///
/// Returns [`Error::ConfigValidation`] for out-of-range values and the
/// command-path errors from [`validate_command_path`] for custom actions
/// whose command is unusable.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    check_unit_range("detector.threshold", settings.detector.threshold)?;
    check_unit_range(
        "realtime.privacy_filter.confidence",
        settings.realtime.privacy_filter.confidence,
    )?;
    check_unit_range(
        "realtime.dog_bark_filter.confidence",
        settings.realtime.dog_bark_filter.confidence,
    )?;
    check_unit_range(
        "realtime.dynamic_threshold.trigger",
        settings.realtime.dynamic_threshold.trigger,
    )?;
    check_unit_range(
        "realtime.dynamic_threshold.min",
        settings.realtime.dynamic_threshold.min,
    )?;
    check_unit_range("realtime.upload.threshold", settings.realtime.upload.threshold)?;

    if !(0.0..=MAX_OVERLAP_SECS).contains(&settings.detector.overlap) {
        return Err(Error::ConfigValidation {
            message: format!(
                "detector.overlap must be within 0.0-{MAX_OVERLAP_SECS}, got {}",
                settings.detector.overlap
            ),
        });
    }

    if settings.realtime.interval == 0 {
        return Err(Error::ConfigValidation {
            message: "realtime.interval must be at least 1 second".to_string(),
        });
    }

    if settings.realtime.dynamic_threshold.valid_hours <= 0 {
        return Err(Error::ConfigValidation {
            message: "realtime.dynamic_threshold.valid_hours must be positive".to_string(),
        });
    }

    for (species, overrides) in &settings.realtime.species.config {
        if let Some(threshold) = overrides.threshold {
            check_unit_range(&format!("species '{species}' threshold"), threshold)?;
        }

        for action in &overrides.actions {
            if action.action_type == ActionType::ExecuteCommand {
                let command = action.command.as_deref().ok_or_else(|| Error::ConfigValidation {
                    message: format!("species '{species}' ExecuteCommand action has no command"),
                })?;
                validate_command_path(command)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{ActionConfig, SpeciesSettings};

    #[test]
    fn test_validate_default_settings() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut settings = Settings::default();
        settings.detector.threshold = 1.5;
        assert!(matches!(
            validate_settings(&settings),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_overlap() {
        let mut settings = Settings::default();
        settings.detector.overlap = 3.0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut settings = Settings::default();
        settings.realtime.interval = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_validate_rejects_relative_command() {
        let mut settings = Settings::default();
        settings.realtime.species.config.insert(
            "common blackbird".to_string(),
            SpeciesSettings {
                threshold: None,
                actions: vec![ActionConfig {
                    action_type: ActionType::ExecuteCommand,
                    command: Some("notify.sh".into()),
                    parameters: vec!["CommonName".to_string()],
                }],
            },
        );
        assert!(matches!(
            validate_settings(&settings),
            Err(Error::CommandNotAbsolute { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_command_without_path() {
        let mut settings = Settings::default();
        settings.realtime.species.config.insert(
            "common blackbird".to_string(),
            SpeciesSettings {
                threshold: None,
                actions: vec![ActionConfig {
                    action_type: ActionType::ExecuteCommand,
                    command: None,
                    parameters: Vec::new(),
                }],
            },
        );
        assert!(matches!(
            validate_settings(&settings),
            Err(Error::ConfigValidation { .. })
        ));
    }
}
