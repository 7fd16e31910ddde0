//! Typed settings for the session log subsystem.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default log root, relative to the process working directory.
pub const DEFAULT_ROOT_DIR: &str = "logs";

/// Default rotation threshold in lines per part file.
pub const DEFAULT_MAX_LINES: u32 = 1000;

/// Default logical stream name.
pub const DEFAULT_SESSION_PREFIX: &str = "log";

/// Process-wide settings consumed by both the writer and the pruner.
///
/// Not persisted; recomputed from configuration on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shared ancestor directory for all session directories.
    pub root_dir: PathBuf,

    /// Lines per part file before rotation. The writer clamps 0 to 1.
    pub max_lines: u32,

    /// Logical stream name embedded in directory and part file names.
    pub session_prefix: String,

    /// Master switch; false disables both writing and pruning.
    pub preserve_logs: bool,

    /// Retention cutoff in days; 0 disables pruning.
    pub max_age_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            max_lines: DEFAULT_MAX_LINES,
            session_prefix: DEFAULT_SESSION_PREFIX.to_string(),
            preserve_logs: true,
            max_age_days: 0,
        }
    }
}

impl Settings {
    /// Rotation threshold with the minimum of 1 applied.
    pub fn effective_max_lines(&self) -> u32 {
        self.max_lines.max(1)
    }
}
