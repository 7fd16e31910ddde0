//! Age-based retention pruning for finalized session directories.
//!
//! The pruner runs as its own short-lived invocation with no channel to
//! the writing process; liveness is read from directory names alone
//! (see [`naming::RUNNING_MARKER`]). A directory still carrying the
//! marker is never deleted, whatever its age; a session stuck running
//! because its process crashed without finalizing is an operational
//! concern, not this sweep's.
//!
//! Per-entry failures are anomalies in the report, not sweep aborts; a
//! listing failure on the root itself is fatal for the invocation.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::naming;

const SECS_PER_DAY: u64 = 86_400;

/// Errors that abort a retention sweep.
#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("failed to list log root {}: {source}", .root.display())]
    ListRoot {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Retention policy, recomputed from configuration on every sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Root directory holding session directories.
    pub root_dir: PathBuf,

    /// Sessions at least this old are removed; 0 disables pruning.
    pub max_age_days: u32,

    /// Master switch for the subsystem.
    pub enabled: bool,
}

impl RetentionPolicy {
    pub fn new(root_dir: impl Into<PathBuf>, max_age_days: u32) -> Self {
        RetentionPolicy {
            root_dir: root_dir.into(),
            max_age_days,
            enabled: true,
        }
    }

    /// Policy derived from a resolved settings snapshot.
    pub fn from_settings(settings: &lk_config::Settings) -> Self {
        RetentionPolicy {
            root_dir: settings.root_dir.clone(),
            max_age_days: settings.max_age_days,
            enabled: settings.preserve_logs,
        }
    }

    fn cutoff(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_age_days) * SECS_PER_DAY)
    }
}

/// Sweep behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Report what would be removed without deleting anything.
    pub dry_run: bool,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Names of session directories removed (or, on a dry run, that
    /// would have been).
    pub removed: Vec<String>,

    /// Directories skipped because their name carries the running
    /// marker.
    pub skipped_running: usize,

    /// Per-entry failures that did not abort the sweep.
    pub anomalies: Vec<String>,

    /// Whether this sweep was a dry run.
    pub dry_run: bool,
}

impl SweepReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Run one retention sweep under `policy`.
pub fn sweep(policy: &RetentionPolicy) -> Result<SweepReport, RetentionError> {
    sweep_with_options(policy, SweepOptions::default())
}

/// Run one retention sweep with explicit options.
pub fn sweep_with_options(
    policy: &RetentionPolicy,
    options: SweepOptions,
) -> Result<SweepReport, RetentionError> {
    let mut report = SweepReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    // Disabled retention touches no filesystem state at all.
    if !policy.enabled || policy.max_age_days == 0 {
        debug!("retention disabled; nothing to prune");
        return Ok(report);
    }

    // An unused log root is a valid steady state, not an error.
    let entries = match fs::read_dir(&policy.root_dir) {
        Ok(entries) => entries,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(root = %policy.root_dir.display(), "log root missing; nothing to prune");
            return Ok(report);
        }
        Err(source) => {
            return Err(RetentionError::ListRoot {
                root: policy.root_dir.clone(),
                source,
            })
        }
    };

    let cutoff = policy.cutoff();
    let now = SystemTime::now();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                report.anomalies.push(format!("unreadable entry: {error}"));
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();

        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => continue,
            Err(error) => {
                report.anomalies.push(format!("{name}: stat failed: {error}"));
                continue;
            }
        }

        // The marker check comes before the age check: an unfinalized
        // session is never reclaimed here, however stale.
        if naming::is_running(&name) {
            debug!(session = %name, "skipping running session");
            report.skipped_running += 1;
            continue;
        }

        let modified = match entry.metadata().and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(error) => {
                report.anomalies.push(format!("{name}: stat failed: {error}"));
                continue;
            }
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age < cutoff {
            continue;
        }

        let age_days = age.as_secs() / SECS_PER_DAY;
        if options.dry_run {
            info!(session = %name, age_days, "would remove session");
            report.removed.push(name);
        } else {
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    info!(session = %name, age_days, "removed session");
                    report.removed.push(name);
                }
                Err(error) => {
                    warn!(session = %name, %error, "failed to remove session");
                    report.anomalies.push(format!("{name}: remove failed: {error}"));
                }
            }
        }
    }

    info!(
        removed = report.removed.len(),
        skipped_running = report.skipped_running,
        anomalies = report.anomalies.len(),
        dry_run = report.dry_run,
        "retention sweep complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Create a session directory with one part file inside, then age
    /// its mtime by `age_days`.
    fn aged_session_dir(root: &Path, name: &str, age_days: u64) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("log_part001.jsonl"), "{\"seq\":0}\n").unwrap();

        let mtime = SystemTime::now() - Duration::from_secs(age_days * SECS_PER_DAY);
        let mtime = filetime::FileTime::from_system_time(mtime);
        filetime::set_file_times(&dir, mtime, mtime).unwrap();
    }

    fn names(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_age_cutoff_removes_only_old_sessions() {
        let tmp = TempDir::new().unwrap();
        for (name, age) in [
            ("log-100-120000-20260801", 0),
            ("log-101-120000-20260730", 1),
            ("log-102-120000-20260728", 2),
            ("log-103-120000-20260710", 5),
        ] {
            aged_session_dir(tmp.path(), name, age);
        }

        let report = sweep(&RetentionPolicy::new(tmp.path(), 3)).unwrap();

        assert_eq!(report.removed, vec!["log-103-120000-20260710".to_string()]);
        assert_eq!(report.removed_count(), 1);
        assert!(report.anomalies.is_empty());
        assert_eq!(
            names(tmp.path()),
            vec![
                "log-100-120000-20260801",
                "log-101-120000-20260730",
                "log-102-120000-20260728",
            ]
        );
    }

    #[test]
    fn test_running_sessions_never_removed() {
        let tmp = TempDir::new().unwrap();
        aged_session_dir(tmp.path(), "log-103-running-120000-20260710", 5);

        let report = sweep(&RetentionPolicy::new(tmp.path(), 3)).unwrap();

        assert_eq!(report.removed_count(), 0);
        assert_eq!(report.skipped_running, 1);
        assert_eq!(names(tmp.path()), vec!["log-103-running-120000-20260710"]);
    }

    #[test]
    fn test_missing_root_is_clean() {
        let tmp = TempDir::new().unwrap();
        let policy = RetentionPolicy::new(tmp.path().join("never-created"), 3);

        let report = sweep(&policy).unwrap();

        assert_eq!(report.removed_count(), 0);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_zero_max_age_disables_without_filesystem_access() {
        let tmp = TempDir::new().unwrap();
        // Point the policy at a plain file: any filesystem access past
        // the short-circuit would error.
        let decoy = tmp.path().join("not-a-directory");
        fs::write(&decoy, "x").unwrap();

        let report = sweep(&RetentionPolicy::new(&decoy, 0)).unwrap();
        assert_eq!(report.removed_count(), 0);
    }

    #[test]
    fn test_disabled_policy_skips_everything() {
        let tmp = TempDir::new().unwrap();
        aged_session_dir(tmp.path(), "log-103-120000-20260710", 5);

        let mut policy = RetentionPolicy::new(tmp.path(), 3);
        policy.enabled = false;

        let report = sweep(&policy).unwrap();
        assert_eq!(report.removed_count(), 0);
        assert_eq!(names(tmp.path()), vec!["log-103-120000-20260710"]);
    }

    #[test]
    fn test_dry_run_reports_without_deleting() {
        let tmp = TempDir::new().unwrap();
        aged_session_dir(tmp.path(), "log-103-120000-20260710", 5);

        let report =
            sweep_with_options(&RetentionPolicy::new(tmp.path(), 3), SweepOptions { dry_run: true })
                .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.removed, vec!["log-103-120000-20260710".to_string()]);
        assert_eq!(names(tmp.path()), vec!["log-103-120000-20260710"]);
    }

    #[test]
    fn test_plain_files_in_root_ignored() {
        let tmp = TempDir::new().unwrap();
        let stray = tmp.path().join("stray.jsonl");
        fs::write(&stray, "{}\n").unwrap();
        let mtime =
            filetime::FileTime::from_system_time(SystemTime::now() - Duration::from_secs(10 * SECS_PER_DAY));
        filetime::set_file_times(&stray, mtime, mtime).unwrap();

        let report = sweep(&RetentionPolicy::new(tmp.path(), 3)).unwrap();

        assert_eq!(report.removed_count(), 0);
        assert!(stray.exists());
    }

    #[test]
    fn test_unlistable_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let file_root = tmp.path().join("actually-a-file");
        fs::write(&file_root, "x").unwrap();

        let err = sweep(&RetentionPolicy::new(&file_root, 3)).unwrap_err();
        assert!(matches!(err, RetentionError::ListRoot { .. }));
    }

    #[test]
    fn test_report_serializes() {
        let report = SweepReport {
            removed: vec!["log-103-120000-20260710".to_string()],
            skipped_running: 2,
            anomalies: vec![],
            dry_run: false,
        };
        let json = serde_json::to_string(&report).unwrap();
        let restored: SweepReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.removed_count(), 1);
        assert_eq!(restored.skipped_running, 2);
    }
}
