//! Session-scoped rotating log writer.
//!
//! One writer owns one session directory for the lifetime of its
//! process. Records are appended as newline-terminated lines to part
//! files that rotate on a line-count threshold; on close the directory
//! is renamed from its running name to its finished name, which is the
//! signal the retention pruner keys off.
//!
//! The writer is single-owner: callers that share it across threads
//! wrap it in [`SharedSessionWriter`] and serialize access themselves.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, warn};

use super::naming::{self, InvalidPrefix};

/// Errors from session writer operations.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Prefix(#[from] InvalidPrefix),

    #[error("cannot finalize {}: target {} and its fallback are both taken", .from.display(), .to.display())]
    FinalizeConflict {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Options for constructing a [`SessionWriter`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub root_dir: PathBuf,
    pub max_lines: u32,
    pub session_prefix: String,
}

impl WriterOptions {
    /// Options with default rotation threshold and prefix.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        WriterOptions {
            root_dir: root_dir.into(),
            max_lines: lk_config::DEFAULT_MAX_LINES,
            session_prefix: lk_config::DEFAULT_SESSION_PREFIX.to_string(),
        }
    }

    /// Build options from a resolved settings snapshot.
    pub fn from_settings(settings: &lk_config::Settings) -> Self {
        WriterOptions {
            root_dir: settings.root_dir.clone(),
            max_lines: settings.max_lines,
            session_prefix: settings.session_prefix.clone(),
        }
    }

    /// Set the rotation threshold (clamped to a minimum of 1).
    pub fn with_max_lines(mut self, max_lines: u32) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Set the session prefix.
    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }
}

/// Shared handle for use with the shutdown coordinator.
pub type SharedSessionWriter = Arc<Mutex<SessionWriter>>;

/// Rotating writer for one log session.
pub struct SessionWriter {
    root_dir: PathBuf,
    max_lines: u32,
    session_prefix: String,
    pid: u32,
    session_dir: PathBuf,
    current_path: PathBuf,
    current: Option<File>,
    line_count: u32,
    part_index: u32,
    closed: bool,
}

impl SessionWriter {
    /// Create the session directory and open part 001 for append.
    ///
    /// The running-named directory exists on disk before this returns,
    /// so nothing outside the writer ever observes a half-created
    /// session. An unusable root is a fatal configuration error.
    pub fn create(options: WriterOptions) -> Result<Self, WriteError> {
        naming::validate_prefix(&options.session_prefix)?;
        let max_lines = options.max_lines.max(1);

        fs::create_dir_all(&options.root_dir)?;

        let pid = std::process::id();
        let started_at = Local::now();
        let session_dir = options.root_dir.join(naming::running_dir_name(
            &options.session_prefix,
            pid,
            started_at,
        ));
        fs::create_dir_all(&session_dir)?;

        let part_index = 1;
        let current_path = session_dir.join(naming::part_file_name(&options.session_prefix, part_index));
        let current = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_path)?;

        debug!(session = %session_dir.display(), "session log opened");

        Ok(SessionWriter {
            root_dir: options.root_dir,
            max_lines,
            session_prefix: options.session_prefix,
            pid,
            session_dir,
            current_path,
            current: Some(current),
            line_count: 0,
            part_index,
            closed: false,
        })
    }

    /// Wrap this writer for sharing with the shutdown coordinator.
    pub fn into_shared(self) -> SharedSessionWriter {
        Arc::new(Mutex::new(self))
    }

    /// Append one record as one newline-terminated line.
    ///
    /// Writes after [`close`](Self::close) are dropped: a closed writer
    /// has no further obligations and never recreates its directory.
    /// I/O failures propagate; retry policy for log data belongs to the
    /// caller.
    pub fn write(&mut self, record: impl AsRef<[u8]>) -> Result<(), WriteError> {
        if self.closed {
            return Ok(());
        }

        // The part file after a rotation is opened here, on first
        // write, so a session ending exactly on a boundary leaves no
        // empty trailing part.
        if self.current.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.current_path)?;
            self.current = Some(file);
        }
        let file = self.current.as_mut().expect("part file just opened");

        file.write_all(&ensure_line(record.as_ref()))?;
        self.line_count += 1;

        if self.line_count >= self.max_lines {
            self.rotate();
        }
        Ok(())
    }

    /// Finalize the session: rename the directory from its running name
    /// to its finished name.
    ///
    /// Idempotent; second and later calls are no-ops. Safe to call from
    /// the signal path: one rename, at most one retried rename on a
    /// name collision. A session whose directory is already gone was
    /// finalized elsewhere and is not an error.
    pub fn close(&mut self) -> Result<(), WriteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;

        if !self.session_dir.exists() {
            return Ok(());
        }

        let finished_at = Local::now();
        let target_name =
            naming::finished_dir_name(&self.session_prefix, self.pid, finished_at);
        let target = self.root_dir.join(&target_name);

        match fs::rename(&self.session_dir, &target) {
            Ok(()) => {
                debug!(session = %target.display(), "session log finalized");
                Ok(())
            }
            Err(first) => {
                // Two sessions finishing within the same second collide
                // on the finished name; retry once with a uniqueness
                // suffix, then give up loudly.
                let fallback = self
                    .root_dir
                    .join(format!("{target_name}-{}", finished_at.timestamp_millis()));
                match fs::rename(&self.session_dir, &fallback) {
                    Ok(()) => {
                        debug!(session = %fallback.display(), "session log finalized (fallback name)");
                        Ok(())
                    }
                    Err(_) => Err(WriteError::FinalizeConflict {
                        from: self.session_dir.clone(),
                        to: target,
                        source: first,
                    }),
                }
            }
        }
    }

    /// Directory this session writes into (running name until close).
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Whether the session has been finalized.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 1-based index of the part the next record lands in.
    pub fn part_index(&self) -> u32 {
        self.part_index
    }

    /// Records written since the current part began.
    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    fn rotate(&mut self) {
        self.part_index += 1;
        self.line_count = 0;
        self.current = None;
        self.current_path = self
            .session_dir
            .join(naming::part_file_name(&self.session_prefix, self.part_index));
        debug!(part = self.part_index, "rotated session log part");
    }
}

impl Drop for SessionWriter {
    fn drop(&mut self) {
        // Best-effort finalize so a writer going out of scope on normal
        // exit still renames its directory; explicit close() reports.
        if !self.closed {
            if let Err(error) = self.close() {
                warn!(%error, "failed to finalize session log on drop");
            }
        }
    }
}

/// Normalize a record into a newline-terminated line. The trailing
/// newline is appended only when absent, never doubled.
fn ensure_line(record: &[u8]) -> Cow<'_, [u8]> {
    match record.last() {
        Some(&b'\n') => Cow::Borrowed(record),
        _ => {
            let mut line = Vec::with_capacity(record.len() + 1);
            line.extend_from_slice(record);
            line.push(b'\n');
            Cow::Owned(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn options(root: &Path) -> WriterOptions {
        WriterOptions::new(root).with_session_prefix("svc")
    }

    fn dir_names(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn running_dirs(root: &Path) -> Vec<String> {
        dir_names(root)
            .into_iter()
            .filter(|n| naming::is_running(n))
            .collect()
    }

    fn part_lines(session_dir: &Path, prefix: &str, index: u32) -> Vec<String> {
        let path = session_dir.join(naming::part_file_name(prefix, index));
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_create_makes_running_dir_and_first_part() {
        let tmp = TempDir::new().unwrap();
        let writer = SessionWriter::create(options(tmp.path())).unwrap();

        assert_eq!(running_dirs(tmp.path()).len(), 1);
        let first_part = writer
            .session_dir()
            .join(naming::part_file_name("svc", 1));
        assert!(first_part.exists());
        assert_eq!(fs::read_to_string(first_part).unwrap(), "");
    }

    #[test]
    fn test_rotation_at_boundary() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path()).with_max_lines(3)).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        for i in 0..7 {
            writer.write(format!("record {i}")).unwrap();
        }

        assert_eq!(part_lines(&session_dir, "svc", 1).len(), 3);
        assert_eq!(part_lines(&session_dir, "svc", 2).len(), 3);
        assert_eq!(part_lines(&session_dir, "svc", 3).len(), 1);
        assert_eq!(writer.part_index(), 3);
        assert_eq!(writer.line_count(), 1);
    }

    #[test]
    fn test_exact_multiple_leaves_no_empty_part() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path()).with_max_lines(2)).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        for i in 0..4 {
            writer.write(format!("record {i}")).unwrap();
        }

        let parts: Vec<_> = fs::read_dir(&session_dir).unwrap().collect();
        assert_eq!(parts.len(), 2, "k*N records must leave exactly k parts");
        assert_eq!(part_lines(&session_dir, "svc", 1).len(), 2);
        assert_eq!(part_lines(&session_dir, "svc", 2).len(), 2);
    }

    #[test]
    fn test_round_trip_order_across_parts() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path()).with_max_lines(4)).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        let records: Vec<String> = (0..11).map(|i| format!(r#"{{"seq":{i}}}"#)).collect();
        for record in &records {
            writer.write(record).unwrap();
        }

        let mut replayed = Vec::new();
        for index in 1..=3 {
            replayed.extend(part_lines(&session_dir, "svc", index));
        }
        assert_eq!(replayed, records);
    }

    #[test]
    fn test_trailing_newline_not_doubled() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        writer.write("with newline\n").unwrap();
        writer.write("without newline").unwrap();

        let raw = fs::read_to_string(session_dir.join(naming::part_file_name("svc", 1))).unwrap();
        assert_eq!(raw, "with newline\nwithout newline\n");
    }

    #[test]
    fn test_close_renames_to_finished() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();
        writer.write("only record").unwrap();
        writer.close().unwrap();

        assert!(running_dirs(tmp.path()).is_empty());
        let names = dir_names(tmp.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(&format!("svc-{}-", std::process::id())));
    }

    #[test]
    fn test_close_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();

        writer.close().unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        assert_eq!(dir_names(tmp.path()).len(), 1);
        assert!(running_dirs(tmp.path()).is_empty());
    }

    #[test]
    fn test_writes_after_close_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path()).with_max_lines(2)).unwrap();
        writer.write("kept").unwrap();
        writer.close().unwrap();

        writer.write("dropped").unwrap();
        writer.write("also dropped").unwrap();

        // Still exactly one finished directory, no resurrected running
        // one, and the dropped records are nowhere on disk.
        let names = dir_names(tmp.path());
        assert_eq!(names.len(), 1);
        assert!(running_dirs(tmp.path()).is_empty());
        let finished = tmp.path().join(&names[0]);
        let raw = fs::read_to_string(finished.join(naming::part_file_name("svc", 1))).unwrap();
        assert_eq!(raw, "kept\n");
    }

    #[test]
    fn test_close_with_missing_dir_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();

        fs::remove_dir_all(writer.session_dir()).unwrap();
        writer.close().unwrap();

        assert!(dir_names(tmp.path()).is_empty());
    }

    #[test]
    fn test_close_collision_falls_back_to_suffixed_name() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();
        writer.write("payload").unwrap();

        // Occupy every plausible finish stamp around now so the first
        // rename attempt is guaranteed to collide.
        let pid = std::process::id();
        let mut decoys = Vec::new();
        for offset in -1..=2 {
            let name = naming::finished_dir_name(
                "svc",
                pid,
                Local::now() + Duration::seconds(offset),
            );
            fs::create_dir_all(tmp.path().join(&name)).unwrap();
            decoys.push(name);
        }

        writer.close().unwrap();

        assert!(running_dirs(tmp.path()).is_empty());
        let survivor: Vec<String> = dir_names(tmp.path())
            .into_iter()
            .filter(|n| !decoys.contains(n))
            .collect();
        assert_eq!(survivor.len(), 1, "exactly one fallback-named session");
        let raw = fs::read_to_string(
            tmp.path()
                .join(&survivor[0])
                .join(naming::part_file_name("svc", 1)),
        )
        .unwrap();
        assert_eq!(raw, "payload\n");
    }

    #[test]
    fn test_drop_finalizes() {
        let tmp = TempDir::new().unwrap();
        {
            let mut writer = SessionWriter::create(options(tmp.path())).unwrap();
            writer.write("record").unwrap();
        }
        assert!(running_dirs(tmp.path()).is_empty());
        assert_eq!(dir_names(tmp.path()).len(), 1);
    }

    #[test]
    fn test_zero_max_lines_clamped_to_one() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path()).with_max_lines(0)).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        writer.write("a").unwrap();
        writer.write("b").unwrap();

        assert_eq!(part_lines(&session_dir, "svc", 1), vec!["a"]);
        assert_eq!(part_lines(&session_dir, "svc", 2), vec!["b"]);
    }

    #[test]
    fn test_invalid_prefix_rejected_at_construction() {
        let tmp = TempDir::new().unwrap();
        let result = SessionWriter::create(
            options(tmp.path()).with_session_prefix("bad/prefix"),
        );
        assert!(matches!(result, Err(WriteError::Prefix(_))));
        assert!(fs::read_dir(tmp.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_empty_record_becomes_blank_line() {
        let tmp = TempDir::new().unwrap();
        let mut writer = SessionWriter::create(options(tmp.path())).unwrap();
        let session_dir = writer.session_dir().to_path_buf();

        writer.write("").unwrap();
        writer.write("after").unwrap();

        let raw = fs::read_to_string(session_dir.join(naming::part_file_name("svc", 1))).unwrap();
        assert_eq!(raw, "\nafter\n");
    }
}
