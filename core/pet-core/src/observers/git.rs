//! Repository state.
//!
//! Priority within one poll: merge conflicts, then a commit that landed since
//! the previous poll (reported once), then a dirty tree. A clean tree reports
//! nothing.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use super::polled::Probe;
use super::run_command;
use crate::error::SourceError;
use crate::source::Observation;

const REFRESH_INTERVAL: Duration = Duration::from_secs(15);
const CONFLICT_CODES: [&str; 3] = ["UU", "AA", "DD"];

pub struct GitProbe {
    repo_path: PathBuf,
    last_head: Option<String>,
}

impl GitProbe {
    pub fn new(repo_path: PathBuf) -> Self {
        Self {
            repo_path,
            last_head: None,
        }
    }

    fn git(&self, args: &[&str]) -> Result<String, SourceError> {
        run_command("git", args, Some(&self.repo_path))
    }
}

impl Probe for GitProbe {
    fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn refresh(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        let head = self.git(&["rev-parse", "HEAD"])?.trim().to_string();
        let new_commit = match self.last_head.replace(head.clone()) {
            Some(previous) if previous != head => {
                Some(self.git(&["log", "-1", "--pretty=%s", &head])?.trim().to_string())
            }
            _ => None,
        };

        let porcelain = self.git(&["status", "--porcelain"])?;
        Ok(classify_repo(&porcelain, new_commit.as_deref()))
    }
}

pub fn classify_repo(porcelain: &str, new_commit_subject: Option<&str>) -> Option<Observation> {
    let lines: Vec<&str> = porcelain.lines().filter(|line| !line.trim().is_empty()).collect();

    let conflicted = lines
        .iter()
        .any(|line| CONFLICT_CODES.iter().any(|code| line.starts_with(code)));
    if conflicted {
        return Some(Observation::label("error").with_message("Merge conflict detected!"));
    }
    if let Some(subject) = new_commit_subject {
        return Some(Observation::label("success").with_message(format!("Commit: {subject}")));
    }
    if !lines.is_empty() {
        return Some(Observation::label("coding"));
    }
    None
}
