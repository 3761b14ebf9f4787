//! Foreground window tracking.
//!
//! `xdotool` gives the focused window's pid; `sysinfo` resolves the process
//! name, which is looked up in the configured process map.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};

use super::polled::Probe;
use super::run_command;
use crate::error::SourceError;
use crate::source::Observation;

const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

pub struct WindowProbe {
    sys: System,
    process_map: BTreeMap<String, String>,
}

impl WindowProbe {
    pub fn new(process_map: BTreeMap<String, String>) -> Self {
        Self {
            sys: System::new(),
            process_map: process_map
                .into_iter()
                .map(|(process, label)| (process.to_lowercase(), label))
                .collect(),
        }
    }

    fn foreground_process(&mut self) -> Result<Option<String>, SourceError> {
        let output = run_command("xdotool", &["getactivewindow", "getwindowpid"], None)?;
        let Ok(pid) = output.trim().parse::<usize>() else {
            return Ok(None);
        };
        let pid = Pid::from(pid);
        self.sys.refresh_process_specifics(pid, ProcessRefreshKind::new());
        Ok(self
            .sys
            .process(pid)
            .map(|process| process.name().to_string()))
    }
}

impl Probe for WindowProbe {
    fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn refresh(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        let Some(process) = self.foreground_process()? else {
            return Ok(None);
        };
        Ok(lookup_process(&self.process_map, &process).map(Observation::label))
    }
}

/// Exact match first, then the longest key the name starts with. Kernel
/// process names are truncated, so prefixes matter.
pub fn lookup_process<'a>(
    process_map: &'a BTreeMap<String, String>,
    process: &str,
) -> Option<&'a str> {
    let name = process.trim().to_lowercase();
    let name = name.strip_suffix(".exe").unwrap_or(&name);
    if let Some(label) = process_map.get(name) {
        return Some(label.as_str());
    }
    process_map
        .iter()
        .filter(|(key, _)| !key.is_empty() && name.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, label)| label.as_str())
}
