//! Hardened external command execution.
//!
//! Custom per-species actions may run an operator-supplied command with
//! values from the detection bound as `--name=value` arguments. The command
//! path, parameter names, and values are all validated before anything is
//! spawned, and the subprocess gets a minimal environment.

use crate::error::{Error, Result};
use crate::observation::Note;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// One command parameter: a name bound from the detection, with an optional
/// caller-supplied literal used when the detection has no such field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParam {
    /// Parameter name; must match `[A-Za-z0-9_-]+`.
    pub name: String,
    /// Fallback value when no detection field matches.
    pub fallback: Option<String>,
}

impl CommandParam {
    /// Parse a config entry of the form `name` or `name=literal`.
    #[must_use]
    pub fn parse(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((name, literal)) => Self {
                name: name.to_string(),
                fallback: Some(literal.to_string()),
            },
            None => Self {
                name: entry.to_string(),
                fallback: None,
            },
        }
    }
}

/// Validate that a command path is absolute, exists, and is executable.
///
/// # Errors
///
/// Returns [`Error::CommandNotAbsolute`], [`Error::CommandNotFound`], or
/// [`Error::CommandNotExecutable`].
pub fn validate_command_path(command: &Path) -> Result<PathBuf> {
    if !command.is_absolute() {
        return Err(Error::CommandNotAbsolute {
            path: command.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(command).map_err(|e| Error::CommandNotFound {
        path: command.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::CommandNotExecutable {
                path: command.to_path_buf(),
            });
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(command.to_path_buf())
}

/// Whether a parameter name contains only `[A-Za-z0-9_-]`.
fn is_valid_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Strip control characters from a parameter value.
///
/// Idempotent: sanitizing a sanitized value is a no-op.
pub fn sanitize_value(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

/// Quote a value when it contains whitespace or quote characters.
fn quote_if_needed(value: String) -> String {
    if value.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value
    }
}

/// Build sanitized `--name=value` arguments from the parameter list.
///
/// Values come from the detection's accessor table when the name matches a
/// field, else from the caller-supplied literal.
///
/// # Errors
///
/// Returns [`Error::InvalidParameterName`] for names outside the allowed
/// character set.
pub fn build_safe_arguments(params: &[CommandParam], note: &Note) -> Result<Vec<String>> {
    let mut args = Vec::with_capacity(params.len());

    for param in params {
        if !is_valid_param_name(&param.name) {
            return Err(Error::InvalidParameterName {
                name: param.name.clone(),
            });
        }

        let raw = note
            .field_value(&param.name)
            .or_else(|| param.fallback.clone())
            .unwrap_or_default();

        let value = quote_if_needed(sanitize_value(&raw));
        args.push(format!("--{}={value}", param.name));
    }

    Ok(args)
}

/// Minimal environment for spawned commands.
fn clean_environment() -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = ["PATH", "TEMP", "TMP"]
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| ((*key).to_string(), v)))
        .collect();

    if cfg!(windows) {
        if let Ok(system_root) = std::env::var("SystemRoot") {
            env.push(("SystemRoot".to_string(), system_root));
        }
    }

    env
}

/// Validate, spawn, and wait for an external command, returning its
/// combined output.
///
/// # Errors
///
/// Returns path/argument validation errors, spawn failures, or
/// [`Error::CommandFailed`] when the command exits non-zero.
pub fn run_command(command: &Path, params: &[CommandParam], note: &Note) -> Result<String> {
    let command_path = validate_command_path(command)?;
    let args = build_safe_arguments(params, note)?;

    debug!("Executing command: {} {:?}", command_path.display(), args);

    let output = Command::new(&command_path)
        .args(&args)
        .env_clear()
        .envs(clean_environment())
        .output()?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: command_path,
            output: combined,
        });
    }

    info!(
        "Command {} executed successfully: {}",
        command_path.display(),
        combined.trim_end()
    );
    Ok(combined)
}
