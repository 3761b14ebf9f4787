//! Pomodoro timer.
//!
//! Driven entirely by the `now` the resolver passes in, so it needs no thread
//! of its own. Controls arrive through a cloneable [`PomodoroHandle`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::error::SourceError;
use crate::source::{Observation, ObservationSource};

const TICKER_MESSAGE_SECS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroPhase {
    Idle,
    Work,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroAction {
    StartWork,
    StartBreak,
    Reset,
    Toggle,
}

impl FromStr for PomodoroAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start_work" => Ok(Self::StartWork),
            "start_break" => Ok(Self::StartBreak),
            "reset" => Ok(Self::Reset),
            "toggle" => Ok(Self::Toggle),
            other => Err(format!("unknown pomodoro action: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PomodoroStatus {
    pub phase: PomodoroPhase,
    pub remaining_secs: i64,
}

#[derive(Debug)]
struct PomodoroTimer {
    work: Duration,
    rest: Duration,
    phase: PomodoroPhase,
    ends_at: Option<DateTime<Utc>>,
    work_just_finished: bool,
    /// Phase and minute of the last countdown message.
    last_ticker: Option<(PomodoroPhase, i64)>,
}

impl PomodoroTimer {
    fn apply(&mut self, action: PomodoroAction, now: DateTime<Utc>) {
        match action {
            PomodoroAction::StartWork => self.enter(PomodoroPhase::Work, now),
            PomodoroAction::StartBreak => self.enter(PomodoroPhase::Break, now),
            PomodoroAction::Reset => self.reset(),
            PomodoroAction::Toggle if self.phase == PomodoroPhase::Idle => {
                self.enter(PomodoroPhase::Work, now)
            }
            PomodoroAction::Toggle => self.reset(),
        }
    }

    fn enter(&mut self, phase: PomodoroPhase, start: DateTime<Utc>) {
        let length = match phase {
            PomodoroPhase::Work => self.work,
            PomodoroPhase::Break => self.rest,
            PomodoroPhase::Idle => return self.reset(),
        };
        self.phase = phase;
        self.ends_at = Some(start + length);
        self.work_just_finished = false;
        self.last_ticker = None;
    }

    fn reset(&mut self) {
        self.phase = PomodoroPhase::Idle;
        self.ends_at = None;
        self.work_just_finished = false;
        self.last_ticker = None;
    }

    /// Rolls finished phases forward: work → break → idle.
    fn advance(&mut self, now: DateTime<Utc>) {
        while let Some(ends_at) = self.ends_at {
            if now < ends_at {
                break;
            }
            match self.phase {
                PomodoroPhase::Work => {
                    self.enter(PomodoroPhase::Break, ends_at);
                    self.work_just_finished = true;
                }
                _ => {
                    let pending = self.work_just_finished;
                    self.reset();
                    self.work_just_finished = pending;
                }
            }
        }
    }

    fn remaining(&self, now: DateTime<Utc>) -> i64 {
        self.ends_at
            .map(|ends_at| {
                let ms = ends_at.signed_duration_since(now).num_milliseconds().max(0);
                (ms + 999) / 1000
            })
            .unwrap_or(0)
    }

    fn observe(&mut self, now: DateTime<Utc>) -> Option<Observation> {
        self.advance(now);
        if self.work_just_finished {
            self.work_just_finished = false;
            return Some(Observation::label("success").with_message("Work session complete!"));
        }
        let (label, prefix) = match self.phase {
            PomodoroPhase::Work => ("coding", "Work"),
            PomodoroPhase::Break => ("idle-coffee", "Break"),
            PomodoroPhase::Idle => return None,
        };
        let observation = Observation::label(label);

        // The countdown is only announced on phase entry and once per minute.
        let remaining = self.remaining(now);
        let ticker = (self.phase, (remaining + 59) / 60);
        if self.last_ticker == Some(ticker) {
            return Some(observation);
        }
        self.last_ticker = Some(ticker);
        Some(
            observation
                .with_message(format!("{prefix}: {}", format_clock(remaining)))
                .with_duration(Duration::seconds(TICKER_MESSAGE_SECS)),
        )
    }
}

fn format_clock(secs: i64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Control side shared with IPC handlers.
#[derive(Debug, Clone)]
pub struct PomodoroHandle(Arc<Mutex<PomodoroTimer>>);

impl PomodoroHandle {
    pub fn apply(&self, action: PomodoroAction, now: DateTime<Utc>) -> PomodoroStatus {
        match self.0.lock() {
            Ok(mut timer) => {
                timer.apply(action, now);
                PomodoroStatus {
                    phase: timer.phase,
                    remaining_secs: timer.remaining(now),
                }
            }
            Err(_) => PomodoroStatus {
                phase: PomodoroPhase::Idle,
                remaining_secs: 0,
            },
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> PomodoroStatus {
        match self.0.lock() {
            Ok(mut timer) => {
                timer.advance(now);
                PomodoroStatus {
                    phase: timer.phase,
                    remaining_secs: timer.remaining(now),
                }
            }
            Err(_) => PomodoroStatus {
                phase: PomodoroPhase::Idle,
                remaining_secs: 0,
            },
        }
    }
}

pub struct PomodoroSource {
    timer: Arc<Mutex<PomodoroTimer>>,
}

impl PomodoroSource {
    pub fn new(work_minutes: u32, break_minutes: u32) -> Self {
        Self {
            timer: Arc::new(Mutex::new(PomodoroTimer {
                work: Duration::minutes(i64::from(work_minutes.max(1))),
                rest: Duration::minutes(i64::from(break_minutes.max(1))),
                phase: PomodoroPhase::Idle,
                ends_at: None,
                work_just_finished: false,
                last_ticker: None,
            })),
        }
    }

    pub fn handle(&self) -> PomodoroHandle {
        PomodoroHandle(Arc::clone(&self.timer))
    }
}

impl ObservationSource for PomodoroSource {
    fn id(&self) -> &str {
        "pomodoro"
    }

    fn stop(&mut self) {
        if let Ok(mut timer) = self.timer.lock() {
            timer.reset();
        }
    }

    fn observe(&mut self, now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        let mut timer = self
            .timer
            .lock()
            .map_err(|_| SourceError::Observation("pomodoro timer poisoned".to_string()))?;
        Ok(timer.observe(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn idle_timer_observes_nothing() {
        let mut source = PomodoroSource::new(25, 5);
        assert_eq!(source.observe(t0()).unwrap(), None);
    }

    #[test]
    fn work_phase_counts_down() {
        let mut source = PomodoroSource::new(25, 5);
        source.handle().apply(PomodoroAction::StartWork, t0());

        let start = source.observe(t0()).unwrap().unwrap();
        assert_eq!(start.label.as_str(), "coding");
        assert_eq!(start.message.as_deref(), Some("Work: 25:00"));
        assert_eq!(start.duration, Some(Duration::seconds(3)));

        let later = source.observe(t0() + Duration::seconds(61)).unwrap().unwrap();
        assert_eq!(later.message.as_deref(), Some("Work: 23:59"));
    }

    #[test]
    fn countdown_is_announced_once_per_minute() {
        let mut source = PomodoroSource::new(25, 5);
        source.handle().apply(PomodoroAction::StartWork, t0());

        let messages: Vec<String> = (0..=120)
            .filter_map(|secs| {
                source
                    .observe(t0() + Duration::seconds(secs))
                    .unwrap()
                    .and_then(|observation| observation.message)
            })
            .collect();

        assert_eq!(messages, vec!["Work: 25:00", "Work: 24:00", "Work: 23:00"]);
        let quiet = source.observe(t0() + Duration::seconds(121)).unwrap().unwrap();
        assert_eq!(quiet.label.as_str(), "coding");
        assert_eq!(quiet.message, None);
    }

    #[test]
    fn restarting_work_announces_again() {
        let mut source = PomodoroSource::new(25, 5);
        let handle = source.handle();
        handle.apply(PomodoroAction::StartWork, t0());
        source.observe(t0()).unwrap();

        handle.apply(PomodoroAction::StartWork, t0() + Duration::seconds(10));
        let restarted = source.observe(t0() + Duration::seconds(10)).unwrap().unwrap();

        assert_eq!(restarted.message.as_deref(), Some("Work: 25:00"));
    }

    #[test]
    fn work_completion_reports_once_then_breaks() {
        let mut source = PomodoroSource::new(25, 5);
        source.handle().apply(PomodoroAction::StartWork, t0());
        let done_at = t0() + Duration::minutes(25);

        let done = source.observe(done_at).unwrap().unwrap();
        assert_eq!(done.label.as_str(), "success");
        assert_eq!(done.message.as_deref(), Some("Work session complete!"));

        let rest = source.observe(done_at + Duration::seconds(1)).unwrap().unwrap();
        assert_eq!(rest.label.as_str(), "idle-coffee");
        assert_eq!(rest.message.as_deref(), Some("Break: 4:59"));

        assert_eq!(source.observe(done_at + Duration::minutes(5)).unwrap(), None);
    }

    #[test]
    fn toggle_starts_and_resets() {
        let source = PomodoroSource::new(25, 5);
        let handle = source.handle();

        let started = handle.apply(PomodoroAction::Toggle, t0());
        assert_eq!(started.phase, PomodoroPhase::Work);
        assert_eq!(started.remaining_secs, 25 * 60);

        let stopped = handle.apply(PomodoroAction::Toggle, t0() + Duration::seconds(5));
        assert_eq!(stopped.phase, PomodoroPhase::Idle);
    }

    #[test]
    fn actions_parse_from_wire_names() {
        assert_eq!(
            "start_break".parse::<PomodoroAction>(),
            Ok(PomodoroAction::StartBreak)
        );
        assert!("snooze".parse::<PomodoroAction>().is_err());
    }
}
