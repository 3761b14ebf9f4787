//! Push-fed sources.
//!
//! Chat, music, weather and notification integrations live outside this crate.
//! They push observations through a [`FeedHandle`]; the matching
//! [`FeedSource`] serves the latest push until its TTL lapses. One-shot
//! pushes (a new chat message, a notification) are consumed by the first
//! `observe()` that sees them.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

use crate::error::SourceError;
use crate::source::{Observation, ObservationSource};

#[derive(Debug, Clone)]
struct Pushed {
    observation: Observation,
    expires_at: DateTime<Utc>,
    one_shot: bool,
}

#[derive(Debug, Clone)]
pub struct FeedHandle {
    ttl: Duration,
    slot: Arc<Mutex<Option<Pushed>>>,
}

impl FeedHandle {
    /// Holds `observation` for the feed's TTL. Replaces any earlier push.
    pub fn push(&self, observation: Observation, now: DateTime<Utc>) {
        self.store(observation, now, false);
    }

    /// Delivered to exactly one `observe()` within the TTL.
    pub fn push_one_shot(&self, observation: Observation, now: DateTime<Utc>) {
        self.store(observation, now, true);
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    fn store(&self, observation: Observation, now: DateTime<Utc>, one_shot: bool) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Pushed {
                observation,
                expires_at: now + self.ttl,
                one_shot,
            });
        }
    }
}

pub struct FeedSource {
    id: String,
    handle: FeedHandle,
}

impl FeedSource {
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            id: id.into(),
            handle: FeedHandle {
                ttl,
                slot: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn handle(&self) -> FeedHandle {
        self.handle.clone()
    }
}

impl ObservationSource for FeedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&mut self) {
        self.handle.clear();
    }

    fn observe(&mut self, now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        let mut slot = self
            .handle
            .slot
            .lock()
            .map_err(|_| SourceError::Observation(format!("{} feed poisoned", self.id)))?;
        let Some(pushed) = slot.as_ref() else {
            return Ok(None);
        };
        if now >= pushed.expires_at {
            *slot = None;
            return Ok(None);
        }
        if pushed.one_shot {
            return Ok(slot.take().map(|pushed| pushed.observation));
        }
        Ok(Some(pushed.observation.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn push_holds_until_ttl() {
        let mut source = FeedSource::new("music", Duration::seconds(30));
        let handle = source.handle();
        handle.push(Observation::label("idle-dancing"), t0());

        for secs in [0, 10, 29] {
            assert_eq!(
                source.observe(t0() + Duration::seconds(secs)).unwrap(),
                Some(Observation::label("idle-dancing"))
            );
        }
        assert_eq!(source.observe(t0() + Duration::seconds(30)).unwrap(), None);
    }

    #[test]
    fn one_shot_is_consumed_by_first_observe() {
        let mut source = FeedSource::new("chat", Duration::seconds(30));
        source.handle().push_one_shot(
            Observation::label("reading").with_message("New message from Sam"),
            t0(),
        );

        let first = source.observe(t0()).unwrap().unwrap();
        assert_eq!(first.message.as_deref(), Some("New message from Sam"));
        assert_eq!(source.observe(t0() + Duration::seconds(1)).unwrap(), None);
    }

    #[test]
    fn stop_clears_pending_push() {
        let mut source = FeedSource::new("weather", Duration::minutes(30));
        source.handle().push(Observation::label("idle-rain"), t0());
        source.stop();
        assert_eq!(source.observe(t0()).unwrap(), None);
    }
}
