//! logkeep configuration loading and validation.
//!
//! This crate provides:
//! - Typed settings for the session log subsystem
//! - Settings resolution (CLI → environment → defaults) with per-field
//!   source tracking for diagnostics
//! - Semantic validation

pub mod resolve;
pub mod settings;
pub mod validate;

pub use resolve::{resolve_settings, ConfigSource, Overrides, ResolveError, Resolved, Sources};
pub use settings::{Settings, DEFAULT_MAX_LINES, DEFAULT_ROOT_DIR, DEFAULT_SESSION_PREFIX};
pub use validate::{validate_settings, ValidationError, ValidationResult};
