//! Build directory activity.
//!
//! Every second the watched tree is scanned for its newest modification time.
//! A change means a build is running (`cooking`); three quiet seconds after
//! the last change means it finished (`success` for eight seconds).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use super::polled::Probe;
use crate::error::SourceError;
use crate::source::Observation;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
const QUIET_SECS: i64 = 3;
const FINISHED_SECS: i64 = 8;

/// Change-driven state machine, fed one newest-mtime sample per poll.
#[derive(Debug, Default)]
pub struct BuildTracker {
    newest: Option<SystemTime>,
    primed: bool,
    last_change: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl BuildTracker {
    pub fn update(&mut self, newest: Option<SystemTime>, now: DateTime<Utc>) -> Option<Observation> {
        if !self.primed {
            self.primed = true;
            self.newest = newest;
            return None;
        }

        if newest != self.newest {
            self.newest = newest;
            self.last_change = Some(now);
            self.finished_at = None;
        }

        if let Some(changed_at) = self.last_change {
            if now.signed_duration_since(changed_at) < ChronoDuration::seconds(QUIET_SECS) {
                return Some(Observation::label("cooking").with_message("Build in progress..."));
            }
            self.last_change = None;
            self.finished_at = Some(now);
        }

        match self.finished_at {
            Some(finished_at)
                if now.signed_duration_since(finished_at)
                    < ChronoDuration::seconds(FINISHED_SECS) =>
            {
                Some(Observation::label("success").with_message("Build complete!"))
            }
            Some(_) => {
                self.finished_at = None;
                None
            }
            None => None,
        }
    }
}

pub struct BuildProbe {
    watch_path: PathBuf,
    tracker: BuildTracker,
}

impl BuildProbe {
    pub fn new(watch_path: PathBuf) -> Self {
        Self {
            watch_path,
            tracker: BuildTracker::default(),
        }
    }
}

impl Probe for BuildProbe {
    fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn refresh(&mut self, now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        if !self.watch_path.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "build path {} is not a directory",
                self.watch_path.display()
            )));
        }
        let newest = newest_mtime(&self.watch_path);
        Ok(self.tracker.update(newest, now))
    }
}

/// Newest modification time anywhere under `root`. Unreadable entries are
/// skipped.
pub fn newest_mtime(root: &Path) -> Option<SystemTime> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter_map(|metadata| metadata.modified().ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn mtime(secs: u64) -> Option<SystemTime> {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + ChronoDuration::seconds(secs)
    }

    #[test]
    fn first_sample_only_primes() {
        let mut tracker = BuildTracker::default();
        assert_eq!(tracker.update(mtime(100), at(0)), None);
        assert_eq!(tracker.update(mtime(100), at(1)), None);
    }

    #[test]
    fn change_cooks_then_quiet_finishes_then_lapses() {
        let mut tracker = BuildTracker::default();
        tracker.update(mtime(100), at(0));

        let cooking = tracker.update(mtime(101), at(1)).unwrap();
        assert_eq!(cooking.label.as_str(), "cooking");
        assert_eq!(tracker.update(mtime(102), at(2)).unwrap().label.as_str(), "cooking");
        assert_eq!(tracker.update(mtime(102), at(4)).unwrap().label.as_str(), "cooking");

        let done = tracker.update(mtime(102), at(5)).unwrap();
        assert_eq!(done.label.as_str(), "success");
        assert_eq!(done.message.as_deref(), Some("Build complete!"));
        assert_eq!(tracker.update(mtime(102), at(12)).unwrap().label.as_str(), "success");

        assert_eq!(tracker.update(mtime(102), at(13)), None);
    }

    #[test]
    fn newest_mtime_walks_nested_directories() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("target").join("debug");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(nested.join("artifact"), b"bin").unwrap();

        assert!(newest_mtime(temp.path()).is_some());
    }
}
