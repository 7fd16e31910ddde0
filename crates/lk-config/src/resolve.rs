//! Settings resolution and source tracking.
//!
//! Resolution order per field: CLI override → environment variable →
//! builtin default. Malformed environment values are errors, not silent
//! fallbacks.

use std::path::PathBuf;

use thiserror::Error;

use crate::settings::Settings;

/// Environment variable names.
pub const ENV_ROOT_DIR: &str = "LOGKEEP_ROOT_DIR";
pub const ENV_MAX_LINES: &str = "LOGKEEP_MAX_LINES";
pub const ENV_SESSION_PREFIX: &str = "LOGKEEP_SESSION_PREFIX";
pub const ENV_PRESERVE: &str = "LOGKEEP_PRESERVE";
pub const ENV_MAX_AGE_DAYS: &str = "LOGKEEP_MAX_AGE_DAYS";

/// Where a setting's value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Using builtin defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// CLI-level overrides applied before the environment is consulted.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root_dir: Option<PathBuf>,
    pub max_lines: Option<u32>,
    pub session_prefix: Option<String>,
    pub preserve_logs: Option<bool>,
    pub max_age_days: Option<u32>,
}

/// Per-field provenance, surfaced by `logkeep check`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sources {
    pub root_dir: ConfigSource,
    pub max_lines: ConfigSource,
    pub session_prefix: ConfigSource,
    pub preserve_logs: ConfigSource,
    pub max_age_days: ConfigSource,
}

/// Resolved settings plus where each one came from.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub settings: Settings,
    pub sources: Sources,
}

/// Resolution errors.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Resolve settings from CLI overrides and the process environment.
pub fn resolve_settings(overrides: &Overrides) -> Result<Resolved, ResolveError> {
    resolve_from(overrides, |var| std::env::var(var).ok())
}

/// Resolution with an injectable environment lookup, for tests.
pub fn resolve_from(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Resolved, ResolveError> {
    let mut settings = Settings::default();
    let mut sources = Sources::default();

    if let Some(root) = &overrides.root_dir {
        settings.root_dir = root.clone();
        sources.root_dir = ConfigSource::CliArgument;
    } else if let Some(value) = env(ENV_ROOT_DIR) {
        settings.root_dir = PathBuf::from(value);
        sources.root_dir = ConfigSource::Environment;
    }

    if let Some(max_lines) = overrides.max_lines {
        settings.max_lines = max_lines;
        sources.max_lines = ConfigSource::CliArgument;
    } else if let Some(value) = env(ENV_MAX_LINES) {
        settings.max_lines = parse_u32(ENV_MAX_LINES, &value)?;
        sources.max_lines = ConfigSource::Environment;
    }

    if let Some(prefix) = &overrides.session_prefix {
        settings.session_prefix = prefix.clone();
        sources.session_prefix = ConfigSource::CliArgument;
    } else if let Some(value) = env(ENV_SESSION_PREFIX) {
        settings.session_prefix = value;
        sources.session_prefix = ConfigSource::Environment;
    }

    if let Some(preserve) = overrides.preserve_logs {
        settings.preserve_logs = preserve;
        sources.preserve_logs = ConfigSource::CliArgument;
    } else if let Some(value) = env(ENV_PRESERVE) {
        settings.preserve_logs = parse_bool(ENV_PRESERVE, &value)?;
        sources.preserve_logs = ConfigSource::Environment;
    }

    if let Some(days) = overrides.max_age_days {
        settings.max_age_days = days;
        sources.max_age_days = ConfigSource::CliArgument;
    } else if let Some(value) = env(ENV_MAX_AGE_DAYS) {
        settings.max_age_days = parse_u32(ENV_MAX_AGE_DAYS, &value)?;
        sources.max_age_days = ConfigSource::Environment;
    }

    Ok(Resolved { settings, sources })
}

fn parse_u32(var: &'static str, value: &str) -> Result<u32, ResolveError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ResolveError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ResolveError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ResolveError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: "expected a boolean (true/false, 1/0, yes/no, on/off)".to_string(),
        }),
    }
}
