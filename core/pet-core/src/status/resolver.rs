//! Multi-source status arbitration.
//!
//! Each tick the resolver first applies pending hook writes. While the hook
//! wrote within the dominance window, the status is left alone and attributed
//! to the hook. Otherwise every registered source is polled and the lowest
//! [`PriorityRank`] wins, ties going to the earliest registration.
//!
//! The resolver never resets to baseline on its own; that is the revert
//! policy's job (see [`super::revert`]).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, warn};

use crate::activity::ActivityLabel;
use crate::messages::Message;
use crate::source::{Observation, ObservationSource, PriorityRank, SourceId};

pub const DEFAULT_DOMINANCE_SECS: i64 = 120;

/// The single authoritative status. Always defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStatus {
    pub label: ActivityLabel,
    pub source: SourceId,
    /// When the label (or its owner) last changed.
    pub since: DateTime<Utc>,
}

impl ResolvedStatus {
    pub fn baseline(now: DateTime<Utc>) -> Self {
        Self {
            label: ActivityLabel::baseline(),
            source: SourceId::Baseline,
            since: now,
        }
    }
}

/// A direct write from the privileged hook channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookWrite {
    pub label: ActivityLabel,
    pub at: DateTime<Utc>,
}

/// Cloneable handle for writing to the hook channel from other threads.
#[derive(Debug, Clone)]
pub struct HookSender(Sender<HookWrite>);

impl HookSender {
    /// Queues a write for the next tick. Returns false once the resolver is gone.
    pub fn write(&self, label: impl Into<ActivityLabel>, at: DateTime<Utc>) -> bool {
        self.0
            .send(HookWrite {
                label: label.into(),
                at,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub dominance: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dominance: Duration::seconds(DEFAULT_DOMINANCE_SECS),
        }
    }
}

/// Result of one resolver tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub status: ResolvedStatus,
    pub changed: bool,
    pub hook_active: bool,
    /// Side message from the winning source, to be forwarded to the queue.
    pub message: Option<Message>,
}

struct RegisteredSource {
    rank: PriorityRank,
    source: Box<dyn ObservationSource>,
    failing: bool,
}

pub struct StatusResolver {
    config: ResolverConfig,
    sources: Vec<RegisteredSource>,
    hook_tx: Sender<HookWrite>,
    hook_rx: Receiver<HookWrite>,
    last_hook_write: Option<DateTime<Utc>>,
    status: ResolvedStatus,
    held_by_watcher: bool,
    /// A (source, label) pair the revert policy cleared. It is kept out of
    /// arbitration until that source reports something else.
    latched: Option<(String, ActivityLabel)>,
    last_forwarded: Option<(String, String)>,
}

impl StatusResolver {
    pub fn new(config: ResolverConfig, now: DateTime<Utc>) -> Self {
        let (hook_tx, hook_rx) = mpsc::channel();
        Self {
            config,
            sources: Vec::new(),
            hook_tx,
            hook_rx,
            last_hook_write: None,
            status: ResolvedStatus::baseline(now),
            held_by_watcher: false,
            latched: None,
            last_forwarded: None,
        }
    }

    /// Registers a source. Registration order breaks rank ties.
    pub fn register(&mut self, rank: PriorityRank, source: Box<dyn ObservationSource>) {
        debug!(source = source.id(), rank = rank.0, "Registered observation source");
        self.sources.push(RegisteredSource {
            rank,
            source,
            failing: false,
        });
    }

    pub fn hook_sender(&self) -> HookSender {
        HookSender(self.hook_tx.clone())
    }

    pub fn current(&self) -> &ResolvedStatus {
        &self.status
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|entry| entry.source.id().to_string())
            .collect()
    }

    pub fn last_hook_write(&self) -> Option<DateTime<Utc>> {
        self.last_hook_write
    }

    pub fn hook_active(&self, now: DateTime<Utc>) -> bool {
        self.last_hook_write
            .map(|at| now.signed_duration_since(at) < self.config.dominance)
            .unwrap_or(false)
    }

    /// True when a registered source produced the current status on the last tick.
    pub fn held_by_watcher(&self) -> bool {
        self.held_by_watcher
    }

    /// Starts every source; a source that fails to start stays registered
    /// and simply keeps reporting nothing.
    pub fn start_all(&mut self) {
        for entry in &mut self.sources {
            if let Err(err) = entry.source.start() {
                warn!(source = entry.source.id(), error = %err, "Failed to start observation source");
            }
        }
    }

    pub fn stop_all(&mut self) {
        for entry in &mut self.sources {
            entry.source.stop();
        }
    }

    /// Applies a hook write immediately (used by tests and single-threaded hosts).
    pub fn apply_hook_write(&mut self, write: HookWrite) {
        if self.status.label != write.label || !self.status.source.is_hook() {
            self.status = ResolvedStatus {
                label: write.label,
                source: SourceId::Hook,
                since: write.at,
            };
        }
        self.last_hook_write = Some(match self.last_hook_write {
            Some(previous) if previous > write.at => previous,
            _ => write.at,
        });
        self.held_by_watcher = false;
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let before = self.status.clone();
        while let Ok(write) = self.hook_rx.try_recv() {
            self.apply_hook_write(write);
        }

        if self.hook_active(now) {
            self.status.source = SourceId::Hook;
            self.held_by_watcher = false;
            return self.outcome(&before, true, None);
        }

        let winner = self.poll_sources(now);
        let Some((source_id, observation)) = winner else {
            self.held_by_watcher = false;
            self.last_forwarded = None;
            return self.outcome(&before, false, None);
        };

        let owner = SourceId::source(source_id.clone());
        if self.status.label != observation.label || self.status.source != owner {
            debug!(
                source = %owner,
                label = %observation.label,
                previous = %self.status.label,
                "Status changed"
            );
            self.status = ResolvedStatus {
                label: observation.label.clone(),
                source: owner,
                since: now,
            };
        }
        self.held_by_watcher = true;

        let message = self.forwardable_message(&source_id, &observation);
        self.outcome(&before, false, message)
    }

    /// Forces the neutral baseline. Called by the revert policy.
    pub fn force_baseline(&mut self, now: DateTime<Utc>) {
        if let SourceId::Source(name) = &self.status.source {
            self.latched = Some((name.clone(), self.status.label.clone()));
        }
        self.status = ResolvedStatus::baseline(now);
        self.held_by_watcher = false;
    }

    fn poll_sources(&mut self, now: DateTime<Utc>) -> Option<(String, Observation)> {
        let mut best: Option<(PriorityRank, String, Observation)> = None;
        let mut latch_still_holds = false;

        for entry in &mut self.sources {
            let observation = match entry.source.observe(now) {
                Ok(observation) => {
                    if entry.failing {
                        debug!(source = entry.source.id(), "Observation source recovered");
                        entry.failing = false;
                    }
                    observation
                }
                Err(err) => {
                    if entry.failing {
                        debug!(source = entry.source.id(), error = %err, "Observation source still failing");
                    } else {
                        warn!(source = entry.source.id(), error = %err, "Observation source failed; skipping this tick");
                        entry.failing = true;
                    }
                    continue;
                }
            };
            let Some(observation) = observation else {
                continue;
            };

            if let Some((latched_id, latched_label)) = &self.latched {
                if latched_id == entry.source.id() && *latched_label == observation.label {
                    latch_still_holds = true;
                    continue;
                }
            }

            let better = best
                .as_ref()
                .map(|(rank, _, _)| entry.rank < *rank)
                .unwrap_or(true);
            if better {
                best = Some((entry.rank, entry.source.id().to_string(), observation));
            }
        }

        if !latch_still_holds {
            self.latched = None;
        }
        best.map(|(_, id, observation)| (id, observation))
    }

    /// A message is forwarded once for as long as the winner keeps reporting
    /// it. Once it stops, the same text counts as new again.
    fn forwardable_message(
        &mut self,
        source_id: &str,
        observation: &Observation,
    ) -> Option<Message> {
        let Some(text) = observation.message.as_ref() else {
            self.last_forwarded = None;
            return None;
        };
        let key = (source_id.to_string(), text.clone());
        if self.last_forwarded.as_ref() == Some(&key) {
            return None;
        }
        self.last_forwarded = Some(key);
        let mut message = Message::new(text.clone(), source_id.to_uppercase());
        if let Some(duration) = observation.duration {
            message = message.with_duration(duration);
        }
        Some(message)
    }

    fn outcome(
        &self,
        before: &ResolvedStatus,
        hook_active: bool,
        message: Option<Message>,
    ) -> TickOutcome {
        TickOutcome {
            status: self.status.clone(),
            changed: before.label != self.status.label,
            hook_active,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::ScriptedSource;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn resolver_with(sources: &[(&ScriptedSource, u8)]) -> StatusResolver {
        let mut resolver = StatusResolver::new(ResolverConfig::default(), t0());
        for (source, rank) in sources {
            resolver.register(PriorityRank(*rank), Box::new((*source).clone()));
        }
        resolver
    }

    #[test]
    fn starts_at_baseline() {
        let resolver = resolver_with(&[]);
        assert_eq!(resolver.current().label, ActivityLabel::baseline());
        assert_eq!(resolver.current().source, SourceId::Baseline);
    }

    #[test]
    fn single_observation_wins_regardless_of_rank() {
        let weather = ScriptedSource::new("weather");
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&git, 2), (&weather, 7)]);
        weather.set(Some("idle-rain"));

        let outcome = resolver.tick(t0());

        assert!(outcome.changed);
        assert_eq!(outcome.status.label.as_str(), "idle-rain");
        assert_eq!(outcome.status.source, SourceId::source("weather"));
    }

    #[test]
    fn lower_rank_wins() {
        let window = ScriptedSource::new("window");
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&window, 4), (&git, 2)]);
        window.set(Some("searching"));
        git.set(Some("coding"));

        let outcome = resolver.tick(t0());

        assert_eq!(outcome.status.label.as_str(), "coding");
        assert_eq!(outcome.status.source, SourceId::source("git"));
    }

    #[test]
    fn rank_ties_go_to_earliest_registration() {
        let window = ScriptedSource::new("window");
        let chat = ScriptedSource::new("chat");
        let mut resolver = resolver_with(&[(&window, 4), (&chat, 4)]);
        window.set(Some("coding"));
        chat.set(Some("reading"));

        let outcome = resolver.tick(t0());

        assert_eq!(outcome.status.source, SourceId::source("window"));
    }

    #[test]
    fn no_observation_leaves_status_unchanged() {
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&git, 2)]);
        git.set(Some("coding"));
        resolver.tick(t0());
        git.set(None);

        let outcome = resolver.tick(t0() + Duration::seconds(2));

        assert!(!outcome.changed);
        assert_eq!(outcome.status.label.as_str(), "coding");
        assert!(!resolver.held_by_watcher());
    }

    #[test]
    fn failing_source_is_skipped_without_aborting_others() {
        let broken = ScriptedSource::new("broken");
        let idle = ScriptedSource::new("idle");
        let mut resolver = resolver_with(&[(&broken, 1), (&idle, 6)]);
        broken.fail("xprintidle missing");
        idle.set(Some("idle"));

        let outcome = resolver.tick(t0());

        assert_eq!(outcome.status.source, SourceId::source("idle"));
    }

    #[test]
    fn hook_dominance_freezes_status_and_attributes_hook() {
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&git, 2)]);
        resolver.hook_sender().write("thinking", t0());
        git.set(Some("error"));

        for secs in [0, 30, 60, 119] {
            let outcome = resolver.tick(t0() + Duration::seconds(secs));
            assert!(outcome.hook_active);
            assert_eq!(outcome.status.label.as_str(), "thinking");
            assert_eq!(outcome.status.source, SourceId::Hook);
        }
    }

    #[test]
    fn hook_dominance_lapses_without_release() {
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&git, 2)]);
        resolver.hook_sender().write("thinking", t0());
        git.set(Some("coding"));
        resolver.tick(t0());

        let outcome = resolver.tick(t0() + Duration::seconds(DEFAULT_DOMINANCE_SECS));

        assert!(!outcome.hook_active);
        assert_eq!(outcome.status.label.as_str(), "coding");
        assert_eq!(outcome.status.source, SourceId::source("git"));
    }

    #[test]
    fn repeated_hook_writes_extend_dominance_but_keep_since() {
        let mut resolver = resolver_with(&[]);
        let hook = resolver.hook_sender();
        hook.write("coding", t0());
        resolver.tick(t0());
        hook.write("coding", t0() + Duration::seconds(90));
        let outcome = resolver.tick(t0() + Duration::seconds(150));

        assert!(outcome.hook_active);
        assert_eq!(outcome.status.since, t0());
    }

    #[test]
    fn messages_are_forwarded_once_per_distinct_text() {
        let build = ScriptedSource::new("build");
        let mut resolver = resolver_with(&[(&build, 3)]);
        build.set_observation(Observation::label("cooking").with_message("Build in progress..."));

        let first = resolver.tick(t0());
        let second = resolver.tick(t0() + Duration::seconds(1));

        let message = first.message.expect("first tick forwards the message");
        assert_eq!(message.text, "Build in progress...");
        assert_eq!(message.source, "BUILD");
        assert!(second.message.is_none());
    }

    #[test]
    fn message_is_forwarded_again_after_the_source_goes_quiet() {
        let git = ScriptedSource::new("git");
        let mut resolver = resolver_with(&[(&git, 2)]);
        let conflict = || Observation::label("error").with_message("Merge conflict detected!");

        git.set_observation(conflict());
        assert!(resolver.tick(t0()).message.is_some());

        git.set(None);
        assert!(resolver.tick(t0() + Duration::seconds(1)).message.is_none());

        git.set_observation(conflict());
        let again = resolver.tick(t0() + Duration::seconds(2));
        assert_eq!(
            again.message.map(|message| message.text).as_deref(),
            Some("Merge conflict detected!")
        );
    }

    #[test]
    fn message_is_forwarded_again_after_a_silent_observation() {
        let build = ScriptedSource::new("build");
        let mut resolver = resolver_with(&[(&build, 3)]);
        let failed = || Observation::label("error").with_message("Build failed");

        build.set_observation(failed());
        assert!(resolver.tick(t0()).message.is_some());
        assert!(resolver.tick(t0() + Duration::seconds(1)).message.is_none());

        build.set(Some("cooking"));
        assert!(resolver.tick(t0() + Duration::seconds(2)).message.is_none());

        build.set_observation(failed());
        assert!(resolver.tick(t0() + Duration::seconds(3)).message.is_some());
    }

    #[test]
    fn forced_baseline_is_not_undone_by_the_same_observation() {
        let build = ScriptedSource::new("build");
        let idle = ScriptedSource::new("idle");
        let mut resolver = resolver_with(&[(&build, 3), (&idle, 6)]);
        build.set(Some("success"));
        resolver.tick(t0());

        resolver.force_baseline(t0() + Duration::seconds(6));
        let outcome = resolver.tick(t0() + Duration::seconds(7));
        assert_eq!(outcome.status.label, ActivityLabel::baseline());

        build.set(Some("cooking"));
        let outcome = resolver.tick(t0() + Duration::seconds(8));
        assert_eq!(outcome.status.label.as_str(), "cooking");
    }

    #[test]
    fn latched_source_lets_lower_priority_through() {
        let build = ScriptedSource::new("build");
        let window = ScriptedSource::new("window");
        let mut resolver = resolver_with(&[(&build, 3), (&window, 4)]);
        build.set(Some("success"));
        window.set(Some("searching"));
        resolver.tick(t0());
        resolver.force_baseline(t0() + Duration::seconds(6));

        let outcome = resolver.tick(t0() + Duration::seconds(7));

        assert_eq!(outcome.status.source, SourceId::source("window"));
    }
}
