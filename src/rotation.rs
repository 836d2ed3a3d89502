//! Size- and time-based rotation for log files.
//!
//! [`RotatingFile`] is a [`Destination`]: every write takes its lock,
//! checks the triggers, rotates if one fired, and appends to a buffered
//! writer. Rotated files are renamed to `<path>.<local timestamp>` and
//! the oldest ones are pruned once `max_backups` is exceeded.

use crate::destination::Destination;
use crate::error::{Result, SinkError};
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

pub const DEFAULT_FILE_BUFFER: usize = 4096;

const BACKUP_TIMESTAMP: &str = "%Y-%m-%dT%H-%M-%S%.9f";

/// When to rotate and how many rotated files to keep.
/// Zero or `None` disables a trigger; `max_backups == 0` keeps every backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the file holds at least this many bytes.
    pub max_size: u64,
    /// Rotate once the current file is this old.
    pub max_age: Option<Duration>,
    /// Rotate on a fixed cadence.
    pub rotate_interval: Option<Duration>,
    pub max_backups: usize,
}

impl RotationPolicy {
    pub fn enabled(&self) -> bool {
        self.max_size > 0 || self.max_age.is_some() || self.rotate_interval.is_some()
    }

    fn due(&self, size: u64, elapsed: Duration) -> bool {
        (self.max_size > 0 && size >= self.max_size)
            || self.max_age.is_some_and(|age| elapsed >= age)
            || self.rotate_interval.is_some_and(|every| elapsed >= every)
    }
}

struct State {
    writer: Option<BufWriter<File>>,
    /// Bytes accepted by the writer since the last rotation.
    size: u64,
    since: Instant,
    closed: bool,
}

pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    buffer_capacity: usize,
    state: Mutex<State>,
    rotations: AtomicU64,
}

impl RotatingFile {
    /// Open `path` for appending, creating missing parent directories.
    ///
    /// **Errors**
    /// - [`SinkError::Config`] for an empty path.
    /// - [`SinkError::Open`] if the directory or file cannot be created.
    pub fn open(
        path: impl Into<PathBuf>,
        policy: RotationPolicy,
        buffer_capacity: usize,
    ) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(SinkError::Config("file path is empty".into()));
        }
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SinkError::Open {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let file = open_append(&path).map_err(|source| SinkError::Open {
            path: path.clone(),
            source,
        })?;
        let size = file.metadata().map(|meta| meta.len()).unwrap_or(0);
        let buffer_capacity = buffer_capacity.max(1);

        Ok(RotatingFile {
            state: Mutex::new(State {
                writer: Some(BufWriter::with_capacity(buffer_capacity, file)),
                size,
                since: Instant::now(),
                closed: false,
            }),
            path,
            policy,
            buffer_capacity,
            rotations: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Completed rotations since open.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Bytes written to the live file, including ones still buffered.
    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// Rotate now, whatever the triggers say.
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SinkError::Closed);
        }
        self.rotate_locked(&mut state)
    }

    fn rotation_error(&self, source: io::Error) -> SinkError {
        SinkError::Rotation {
            path: self.path.clone(),
            source,
        }
    }

    fn rotate_locked(&self, state: &mut State) -> Result<()> {
        if let Some(writer) = state.writer.as_mut() {
            writer.flush().map_err(|e| self.rotation_error(e))?;
            writer.get_ref().sync_all().map_err(|e| self.rotation_error(e))?;
        }
        // Close before renaming.
        state.writer = None;

        let backup = self.backup_path();
        if let Err(rename) = fs::rename(&self.path, &backup) {
            return match open_append(&self.path) {
                Ok(file) => {
                    state.writer = Some(BufWriter::with_capacity(self.buffer_capacity, file));
                    Err(SinkError::RenameFailed {
                        path: self.path.clone(),
                        source: rename,
                    })
                }
                Err(reopen) => Err(SinkError::Reopen { rename, reopen }),
            };
        }

        let file = open_append(&self.path).map_err(|e| self.rotation_error(e))?;
        state.writer = Some(BufWriter::with_capacity(self.buffer_capacity, file));
        state.size = 0;
        state.since = Instant::now();
        self.rotations.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            target: "log_dispatch",
            path = %self.path.display(),
            backup = %backup.display(),
            "rotated log file"
        );

        if self.policy.max_backups > 0 {
            self.prune_backups();
        }
        Ok(())
    }

    /// `<path>.<timestamp>`, made unique with a numeric suffix.
    fn backup_path(&self) -> PathBuf {
        let stamp = Local::now().format(BACKUP_TIMESTAMP);
        let mut base = self.path.clone().into_os_string();
        base.push(format!(".{stamp}"));
        let base = PathBuf::from(base);

        let mut candidate = base.clone();
        let mut n = 1u32;
        while candidate.exists() {
            let mut name = base.clone().into_os_string();
            name.push(format!(".{n}"));
            candidate = PathBuf::from(name);
            n += 1;
        }
        candidate
    }

    /// Delete all but the newest `max_backups` rotated files. Failures are
    /// logged and otherwise ignored.
    fn prune_backups(&self) {
        let Some(name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let prefix = format!("{name}.");
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    target: "log_dispatch",
                    dir = %dir.display(),
                    error = %err,
                    "cannot list backups"
                );
                return;
            }
        };

        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let suffix = file_name.to_str()?.strip_prefix(prefix.as_str())?;
                if !suffix.starts_with(|c: char| c.is_ascii_digit()) {
                    return None;
                }
                let modified = entry.metadata().and_then(|meta| meta.modified()).ok()?;
                Some((modified, entry.path()))
            })
            .collect();

        let excess = backups.len().saturating_sub(self.policy.max_backups);
        if excess == 0 {
            return;
        }
        // Oldest first; names carry the rotation time, so they break ties.
        backups.sort();
        for (_, path) in backups.drain(..excess) {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(
                    target: "log_dispatch",
                    path = %path.display(),
                    error = %err,
                    "cannot remove old backup"
                );
            }
        }
    }
}

impl Destination for RotatingFile {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(SinkError::Closed.into_io());
        }

        if self.policy.due(state.size, state.since.elapsed()) {
            self.rotate_locked(state).map_err(SinkError::into_io)?;
        }

        if state.writer.is_none() {
            // A failed rotation left no file open; try again now.
            let file = open_append(&self.path)?;
            state.writer = Some(BufWriter::with_capacity(self.buffer_capacity, file));
        }
        if let Some(writer) = state.writer.as_mut() {
            writer.write_all(buf)?;
            state.size += buf.len() as u64;
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match self.state.lock().writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn close(&self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        match state.writer.take() {
            Some(mut writer) => {
                writer.flush()?;
                writer.get_ref().sync_all()
            }
            None => Ok(()),
        }
    }

    /// Writes and rotations are serialized by the state lock.
    fn concurrent_safe(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .field("rotations", &self.rotations())
            .finish()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backups(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.starts_with("app.log."))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn size_trigger_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let policy = RotationPolicy { max_size: 100, ..Default::default() };
        let file = RotatingFile::open(&path, policy, DEFAULT_FILE_BUFFER).unwrap();

        for _ in 0..10 {
            file.write_all(&[b'x'; 30]).unwrap();
        }
        file.close().unwrap();

        assert!(file.rotations() >= 1);
        assert!(!backups(dir.path()).is_empty());
        assert!(path.exists());
    }

    #[test]
    fn size_starts_from_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, [b'y'; 64]).unwrap();

        let file = RotatingFile::open(&path, RotationPolicy::default(), 16).unwrap();
        assert_eq!(file.size(), 64);
        file.write_all(b"abc").unwrap();
        assert_eq!(file.size(), 67);
    }

    #[test]
    fn prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let policy = RotationPolicy { max_backups: 2, ..Default::default() };
        let file = RotatingFile::open(&path, policy, DEFAULT_FILE_BUFFER).unwrap();

        for i in 0..5 {
            file.write_all(format!("generation {i}\n").as_bytes()).unwrap();
            file.rotate().unwrap();
        }
        file.close().unwrap();

        let kept = backups(dir.path());
        assert_eq!(kept.len(), 2, "{kept:?}");
        assert_eq!(fs::read_to_string(dir.path().join(&kept[1])).unwrap(), "generation 4\n");
    }

    #[test]
    fn unrelated_siblings_survive_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(dir.path().join("app.log.bak"), b"keep").unwrap();
        let policy = RotationPolicy { max_backups: 1, ..Default::default() };
        let file = RotatingFile::open(&path, policy, DEFAULT_FILE_BUFFER).unwrap();
        file.rotate().unwrap();
        file.rotate().unwrap();

        assert!(dir.path().join("app.log.bak").exists());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/app.log");
        let file = RotatingFile::open(&path, RotationPolicy::default(), 0).unwrap();
        file.write_all(b"hi\n").unwrap();
        file.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi\n");
    }

    #[test]
    fn writes_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile::open(dir.path().join("app.log"), RotationPolicy::default(), 16)
            .unwrap();
        file.close().unwrap();
        let err = file.write_all(b"late").unwrap_err();
        assert!(matches!(SinkError::from(err), SinkError::Closed));
    }
}
