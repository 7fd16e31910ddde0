//! Semantic validation of resolved settings.

use thiserror::Error;

use crate::settings::Settings;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Settings validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Validate a resolved settings snapshot semantically.
///
/// The writer applies its own clamp for `max_lines == 0`, so that case
/// is accepted here; structural problems that would produce broken
/// directory names are not.
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    if settings.root_dir.as_os_str().is_empty() {
        return Err(ValidationError::MissingField("root_dir".to_string()));
    }

    if settings.session_prefix.is_empty() {
        return Err(ValidationError::MissingField("session_prefix".to_string()));
    }

    if settings.session_prefix.contains('/') || settings.session_prefix.contains('\\') {
        return Err(ValidationError::InvalidValue {
            field: "session_prefix".to_string(),
            message: format!(
                "must not contain a path separator, got {:?}",
                settings.session_prefix
            ),
        });
    }

    if settings.session_prefix.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidValue {
            field: "session_prefix".to_string(),
            message: format!("must not contain whitespace, got {:?}", settings.session_prefix),
        });
    }

    Ok(())
}
