//! System idle detection.
//!
//! Asks `xprintidle` for the milliseconds since the last input event and
//! reports `idle` once that passes the threshold.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::polled::Probe;
use super::run_command;
use crate::error::SourceError;
use crate::source::Observation;

const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

pub struct IdleProbe {
    threshold: Duration,
}

impl IdleProbe {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

impl Probe for IdleProbe {
    fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn refresh(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        let output = run_command("xprintidle", &[], None)?;
        let idle_ms = parse_idle_ms(&output)?;
        Ok(classify_idle(Duration::from_millis(idle_ms), self.threshold))
    }
}

fn parse_idle_ms(output: &str) -> Result<u64, SourceError> {
    output.trim().parse::<u64>().map_err(|err| {
        SourceError::Observation(format!("unexpected xprintidle output {output:?}: {err}"))
    })
}

pub fn classify_idle(idle_for: Duration, threshold: Duration) -> Option<Observation> {
    (idle_for >= threshold).then(|| Observation::label("idle"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_only_at_or_past_threshold() {
        let threshold = Duration::from_secs(60);
        assert_eq!(classify_idle(Duration::from_secs(59), threshold), None);
        assert_eq!(
            classify_idle(Duration::from_secs(60), threshold),
            Some(Observation::label("idle"))
        );
    }

    #[test]
    fn parses_xprintidle_output() {
        assert_eq!(parse_idle_ms("61234\n").unwrap(), 61_234);
        assert!(parse_idle_ms("").is_err());
    }
}
