//! Size-rotated log files on top of `file-rotate`.
//!
//! `app.log` rolls over to `app.log.20240501T123000` (a `.N` suffix is added
//! when several rollovers land in the same second) once it grows past the
//! size limit. A rollover never splits a write, so lines stay whole. The
//! newest `max_backups` backups are kept; after each rollover, backups last
//! modified more than `max_age_days` ago are removed as well.

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

const MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// A log file that rotates itself. Safe to share between threads; each
/// line is appended under the file's lock.
pub struct RollingFile {
    path: PathBuf,
    max_bytes: u64,
    max_age: Option<Duration>,
    active: Mutex<ActiveFile>,
}

struct ActiveFile {
    file: FileRotate<AppendTimestamp>,
    /// Bytes in the current file, tracked to notice rollovers
    size: u64,
}

impl RollingFile {
    /// Open (or create) `path`, rotating at `max_size_mb` megabytes.
    ///
    /// Zero for `max_backups` or `max_age_days` disables that limit.
    pub fn open(
        path: impl AsRef<Path>,
        max_size_mb: u64,
        max_backups: usize,
        max_age_days: u64,
    ) -> io::Result<Self> {
        Self::with_max_bytes(path, max_size_mb.saturating_mul(MEGABYTE), max_backups, max_age_days)
    }

    pub fn with_max_bytes(
        path: impl AsRef<Path>,
        max_bytes: u64,
        max_backups: usize,
        max_age_days: u64,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        // file-rotate opens lazily; an unusable path must fail here instead
        let size = open_append(&path)?.metadata()?.len();

        let max_files = match max_backups {
            0 => usize::MAX,
            n => n,
        };
        let mut file = FileRotate::new(
            &path,
            AppendTimestamp::default(FileLimit::MaxFiles(max_files)),
            ContentLimit::BytesSurpassed(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
            Compression::None,
            #[cfg(unix)]
            None,
        );

        let max_age = (max_age_days > 0)
            .then(|| Duration::from_secs(max_age_days.saturating_mul(SECONDS_PER_DAY)));
        remove_expired(&path, &mut file, max_age);

        Ok(Self {
            path,
            max_bytes,
            max_age,
            active: Mutex::new(ActiveFile { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one complete line
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut active = self.lock();
        // file-rotate rolls over before the first write past the limit
        let rolls_over = active.size > self.max_bytes;

        active.file.write_all(line)?;

        if rolls_over {
            active.size = 0;
            remove_expired(&self.path, &mut active.file, self.max_age);
        }
        active.size += line.len() as u64;
        Ok(())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock().file.flush()
    }

    /// Backups of this file currently on disk, newest first
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .lock()
            .file
            .log_paths()
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        paths.reverse();
        paths
    }

    fn lock(&self) -> MutexGuard<'_, ActiveFile> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for RollingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingFile")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("max_age", &self.max_age)
            .finish()
    }
}

/// Remove backups last modified before the age limit. Failures are
/// reported on stderr; an unrepresentable cutoff means no limit.
fn remove_expired(path: &Path, file: &mut FileRotate<AppendTimestamp>, max_age: Option<Duration>) {
    let Some(cutoff) = max_age.and_then(|age| SystemTime::now().checked_sub(age)) else {
        return;
    };

    for backup in file.log_paths() {
        let expired = fs::metadata(&backup)
            .and_then(|m| m.modified())
            .is_ok_and(|modified| modified < cutoff);
        if !expired {
            continue;
        }
        if let Err(e) = fs::remove_file(&backup) {
            if e.kind() != io::ErrorKind::NotFound {
                eprintln!(
                    "tiered-log: failed to remove expired backup {} of {}: {}",
                    backup.display(),
                    path.display(),
                    e
                );
            }
        }
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
