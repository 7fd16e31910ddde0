//! On-disk naming contract for session directories and part files.
//!
//! The directory name is the only cross-process coordination channel:
//! while a session is live its directory carries [`RUNNING_MARKER`], and
//! the retention pruner refuses to touch any entry whose name contains
//! it. Both sides read the marker from here so they cannot drift.
//!
//! Layout:
//! - running session: `{prefix}-{pid}-running-{HHMMSS}-{YYYYMMDD}`
//! - finished session: `{prefix}-{pid}-{HHMMSS}-{YYYYMMDD}` (the stamp
//!   is the finalize moment, not the start moment)
//! - part file: `{prefix}_part{NNN}.jsonl`, 1-based, zero-padded

use chrono::{DateTime, Local};
use thiserror::Error;

/// Substring marking a session directory as owned by a live process.
pub const RUNNING_MARKER: &str = "running-";

/// Extension for line-delimited JSON part files.
pub const PART_EXTENSION: &str = "jsonl";

/// Zero-padding width for part indices.
const PART_PADDING: usize = 3;

/// Prefix values that would corrupt the naming contract.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvalidPrefix {
    #[error("session prefix is empty")]
    Empty,

    #[error("session prefix {0:?} contains a path separator")]
    PathSeparator(String),

    #[error("session prefix {0:?} contains the reserved running marker")]
    ContainsMarker(String),
}

/// Check a session prefix against the naming contract.
///
/// A prefix containing [`RUNNING_MARKER`] would make a finished
/// directory look permanently live to the pruner, so it is rejected
/// outright rather than sanitized.
pub fn validate_prefix(prefix: &str) -> Result<(), InvalidPrefix> {
    if prefix.is_empty() {
        return Err(InvalidPrefix::Empty);
    }
    if prefix.contains('/') || prefix.contains('\\') {
        return Err(InvalidPrefix::PathSeparator(prefix.to_string()));
    }
    if prefix.contains(RUNNING_MARKER) {
        return Err(InvalidPrefix::ContainsMarker(prefix.to_string()));
    }
    Ok(())
}

fn stamp(at: DateTime<Local>) -> String {
    format!("{}-{}", at.format("%H%M%S"), at.format("%Y%m%d"))
}

/// Directory name for a live session.
pub fn running_dir_name(prefix: &str, pid: u32, started_at: DateTime<Local>) -> String {
    format!("{prefix}-{pid}-{RUNNING_MARKER}{}", stamp(started_at))
}

/// Directory name for a finalized session.
pub fn finished_dir_name(prefix: &str, pid: u32, finished_at: DateTime<Local>) -> String {
    format!("{prefix}-{pid}-{}", stamp(finished_at))
}

/// Whether a directory name marks a session still owned by a live
/// process. Evaluated fresh per entry by the pruner.
pub fn is_running(name: &str) -> bool {
    name.contains(RUNNING_MARKER)
}

/// File name for a part within a session, 1-based index.
pub fn part_file_name(prefix: &str, index: u32) -> String {
    format!(
        "{prefix}_part{index:0width$}.{PART_EXTENSION}",
        width = PART_PADDING
    )
}
