//! On-disk archive of recent captures.
//!
//! The archive is a plain directory of `print_YYYYMMDD_HHMMSS.jpg` files. There
//! is no index: listing the directory is the source of truth, and because the
//! timestamp is zero-padded, sorting by file name sorts chronologically.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use chrono::{DateTime, Local, NaiveDateTime};

use crate::{domain::CapturedImage, errors::Error, Result};

const ENTRY_PREFIX: &str = "print_";
const ENTRY_EXTENSION: &str = ".jpg";
const ENTRY_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Timestamp label used in file names and photo captions.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(ENTRY_TIME_FORMAT).to_string()
}

/// File name for a capture taken at `at` (second resolution).
pub fn entry_file_name(at: DateTime<Local>) -> String {
    format!("{ENTRY_PREFIX}{}{ENTRY_EXTENSION}", format_timestamp(at))
}

/// Timestamp encoded in an archive file name, or `None` if the name does not
/// follow the archive naming pattern.
pub fn parse_entry_name(name: &str) -> Option<NaiveDateTime> {
    let stamp = name
        .strip_prefix(ENTRY_PREFIX)?
        .strip_suffix(ENTRY_EXTENSION)?;
    // chrono accepts non-padded fields; the archive only ever writes padded ones.
    if stamp.len() != 15 {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, ENTRY_TIME_FORMAT).ok()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    /// Capture time as encoded in the file name.
    pub taken_at: NaiveDateTime,
    /// Filesystem modification time; this is what retention is based on.
    pub modified: SystemTime,
}

impl ArchiveEntry {
    /// Age relative to `now`; entries modified "in the future" are age zero.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or(Duration::ZERO)
    }
}

/// Outcome of one prune pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub retained: usize,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    /// Open the archive at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::persistence(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a capture taken at `at` is stored under.
    pub fn entry_path(&self, at: DateTime<Local>) -> PathBuf {
        self.dir.join(entry_file_name(at))
    }

    /// Write `image` under the name derived from `at`.
    ///
    /// A second capture within the same second overwrites the first.
    pub async fn save(&self, image: &CapturedImage, at: DateTime<Local>) -> Result<PathBuf> {
        let path = self.entry_path(at);
        tokio::fs::write(&path, &image.jpeg)
            .await
            .map_err(|e| Error::persistence(&path, e))?;
        Ok(path)
    }

    /// All archive entries, oldest first. Files that do not follow the naming
    /// pattern are skipped.
    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| Error::persistence(&self.dir, e))?;

        let mut out = Vec::new();
        for dent in read_dir {
            let dent = dent.map_err(|e| Error::persistence(&self.dir, e))?;
            let name = dent.file_name();
            let Some(taken_at) = name.to_str().and_then(parse_entry_name) else {
                continue;
            };
            let path = dent.path();
            let md = match dent.metadata() {
                Ok(md) if md.is_file() => md,
                Ok(_) => continue,
                Err(e) => {
                    // Raced with a delete, or unreadable; either way not ours to keep listing.
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable archive entry");
                    continue;
                }
            };
            let modified = md.modified().map_err(|e| Error::persistence(&path, e))?;
            out.push(ArchiveEntry {
                path,
                taken_at,
                modified,
            });
        }

        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    /// Newest entry by file name, if any.
    pub fn latest(&self) -> Result<Option<ArchiveEntry>> {
        Ok(self.entries()?.pop())
    }

    /// Delete entries whose modification time is more than `max_age` ago.
    pub fn prune(&self, max_age: Duration) -> Result<PruneReport> {
        self.prune_at(max_age, SystemTime::now())
    }

    /// [`prune`](Self::prune) against an explicit clock reading.
    ///
    /// An entry exactly `max_age` old is kept. A failed delete is logged and
    /// recorded; the scan continues with the remaining entries.
    pub fn prune_at(&self, max_age: Duration, now: SystemTime) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        for entry in self.entries()? {
            if entry.age_at(now) <= max_age {
                report.retained += 1;
                continue;
            }

            match fs::remove_file(&entry.path) {
                Ok(()) => {
                    tracing::debug!(path = %entry.path.display(), "pruned capture");
                    report.removed.push(entry.path);
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "failed to prune capture");
                    report.failed.push((entry.path, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}
