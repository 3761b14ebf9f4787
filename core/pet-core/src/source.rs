//! Observation sources: the uniform contract every watcher implements.
//!
//! A source produces at most one [`Observation`] per poll. `observe()` must
//! return immediately; sources that block on I/O refresh in the background
//! (see [`crate::observers::PolledSource`]) and only hand back their cache.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::activity::ActivityLabel;
use crate::error::SourceError;

/// Arbitration rank; lower wins. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityRank(pub u8);

impl PriorityRank {
    pub const HOOK: PriorityRank = PriorityRank(0);
    pub const POMODORO: PriorityRank = PriorityRank(1);
    pub const GIT: PriorityRank = PriorityRank(2);
    pub const BUILD: PriorityRank = PriorityRank(3);
    pub const WINDOW: PriorityRank = PriorityRank(4);
    pub const CHAT: PriorityRank = PriorityRank(4);
    pub const SYSTEM: PriorityRank = PriorityRank(5);
    pub const NOTIFICATIONS: PriorityRank = PriorityRank(5);
    pub const MUSIC: PriorityRank = PriorityRank(6);
    pub const IDLE: PriorityRank = PriorityRank(6);
    pub const WEATHER: PriorityRank = PriorityRank(7);
}

/// Identity of a status owner. The hook channel is not a registered source
/// but still shows up here as the winner while it dominates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum SourceId {
    /// Startup default and forced reverts.
    Baseline,
    Hook,
    Source(String),
}

impl SourceId {
    pub fn source(name: impl Into<String>) -> Self {
        SourceId::Source(name.into())
    }

    pub fn is_hook(&self) -> bool {
        matches!(self, SourceId::Hook)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Baseline => f.write_str("baseline"),
            SourceId::Hook => f.write_str("hook"),
            SourceId::Source(name) => f.write_str(name),
        }
    }
}

/// One poll's worth of signal from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub label: ActivityLabel,
    pub message: Option<String>,
    /// Explicit display duration for the attached message.
    pub duration: Option<Duration>,
}

impl Observation {
    pub fn label(label: impl Into<ActivityLabel>) -> Self {
        Self {
            label: label.into(),
            message: None,
            duration: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Uniform contract for every watcher feeding the resolver.
pub trait ObservationSource: Send {
    /// Stable name used for attribution and logging.
    fn id(&self) -> &str;

    fn start(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn stop(&mut self) {}

    /// Returns the latest observation without blocking.
    fn observe(&mut self, now: DateTime<Utc>) -> Result<Option<Observation>, SourceError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sources for resolver tests.

    use super::*;
    use std::sync::{Arc, Mutex};

    /// A source whose next result is set from the test body.
    #[derive(Clone)]
    pub struct ScriptedSource {
        name: String,
        next: Arc<Mutex<Result<Option<Observation>, SourceError>>>,
    }

    impl ScriptedSource {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                next: Arc::new(Mutex::new(Ok(None))),
            }
        }

        pub fn set(&self, label: Option<&str>) {
            *self.next.lock().unwrap() = Ok(label.map(Observation::label));
        }

        pub fn set_observation(&self, observation: Observation) {
            *self.next.lock().unwrap() = Ok(Some(observation));
        }

        pub fn fail(&self, details: &str) {
            *self.next.lock().unwrap() = Err(SourceError::Observation(details.to_string()));
        }
    }

    impl ObservationSource for ScriptedSource {
        fn id(&self) -> &str {
            &self.name
        }

        fn observe(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
            self.next.lock().unwrap().clone()
        }
    }
}
