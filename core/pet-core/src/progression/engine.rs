//! The progression task's owned state machine.
//!
//! The owner calls [`ProgressionEngine::on_tick`] once per period with the
//! label it wants credited, then [`ProgressionEngine::maybe_flush`]. Nothing
//! here blocks except the flush itself, which is a single small file write.

use chrono::{DateTime, Duration, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use super::ladder::advance_overall;
use super::state::{LevelKind, LevelUp, ProgressionSnapshot, ProgressionState};
use super::store::ProgressionStore;
use crate::activity::{self, ActivityLabel};

pub const DEFAULT_PROGRESSION_TICK_MS: i64 = 1_000;
pub const DEFAULT_FLUSH_SECS: i64 = 10;

#[derive(Debug, Clone)]
pub struct ProgressionConfig {
    pub tick: Duration,
    pub flush_interval: Duration,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            tick: Duration::milliseconds(DEFAULT_PROGRESSION_TICK_MS),
            flush_interval: Duration::seconds(DEFAULT_FLUSH_SECS),
        }
    }
}

pub struct ProgressionEngine {
    config: ProgressionConfig,
    store: ProgressionStore,
    state: ProgressionState,
    dirty: bool,
    last_flush: DateTime<Utc>,
    subscribers: Vec<Sender<LevelUp>>,
}

impl ProgressionEngine {
    /// Loads persisted state (recovering to a fresh state when unusable) and
    /// counts the load as a new session.
    pub fn load(config: ProgressionConfig, store: ProgressionStore, now: DateTime<Utc>) -> Self {
        let mut state = store.load_or_default();
        state.sessions += 1;
        info!(
            level = state.level,
            total_xp = state.total_xp,
            sessions = state.sessions,
            "Progression loaded"
        );
        Self {
            config,
            store,
            state,
            dirty: true,
            last_flush: now,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        self.state.snapshot()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn subscribe(&mut self) -> Receiver<LevelUp> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Credits one tick of `label`. Returns every level-up it caused, skill
    /// level-ups first.
    pub fn on_tick(&mut self, label: &ActivityLabel) -> Vec<LevelUp> {
        let rate = activity::xp_rate(label);
        if rate == 0 {
            return Vec::new();
        }

        let tick_ms = u64::try_from(self.config.tick.num_milliseconds()).unwrap_or(0);
        self.state.total_active_ms = self.state.total_active_ms.saturating_add(tick_ms);

        let mut level_ups = Vec::new();
        if let Some(skill) = activity::skill_for(label) {
            let record = self
                .state
                .skills
                .entry(skill.key().to_string())
                .or_default();
            for new_level in record.grant(rate) {
                level_ups.push(LevelUp {
                    kind: LevelKind::Skill,
                    name: Some(skill.key().to_string()),
                    new_level,
                });
            }
        }

        self.state.total_xp = self.state.total_xp.saturating_add(rate);
        for new_level in advance_overall(self.state.total_xp, &mut self.state.level) {
            level_ups.push(LevelUp {
                kind: LevelKind::Overall,
                name: None,
                new_level,
            });
        }

        self.dirty = true;
        if !level_ups.is_empty() {
            self.broadcast(&level_ups);
        }
        level_ups
    }

    /// Flushes when dirty and the flush interval has elapsed.
    pub fn maybe_flush(&mut self, now: DateTime<Utc>) -> bool {
        if !self.dirty || now.signed_duration_since(self.last_flush) < self.config.flush_interval {
            return false;
        }
        self.flush(now);
        true
    }

    /// Best-effort write. A failure is logged and the state stays dirty so
    /// the next interval retries.
    pub fn flush(&mut self, now: DateTime<Utc>) {
        self.last_flush = now;
        match self.store.save(&self.state) {
            Ok(()) => {
                self.dirty = false;
                debug!(total_xp = self.state.total_xp, "Progression flushed");
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist progression");
            }
        }
    }

    /// Final flush on controlled shutdown.
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        if self.dirty {
            self.flush(now);
        }
        self.subscribers.clear();
    }

    fn broadcast(&mut self, level_ups: &[LevelUp]) {
        for level_up in level_ups {
            info!(
                kind = ?level_up.kind,
                name = level_up.name.as_deref().unwrap_or("overall"),
                new_level = level_up.new_level,
                "Level up"
            );
        }
        self.subscribers.retain(|subscriber| {
            level_ups
                .iter()
                .all(|level_up| subscriber.send(level_up.clone()).is_ok())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::ladder::SkillRecord;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> ProgressionEngine {
        ProgressionEngine::load(
            ProgressionConfig::default(),
            ProgressionStore::new_in_memory(),
            t0(),
        )
    }

    #[test]
    fn load_counts_a_session() {
        assert_eq!(engine().state().sessions, 1);
    }

    #[test]
    fn zero_rate_grants_nothing_and_accrues_no_active_time() {
        let mut engine = engine();
        let before = engine.state().clone();

        assert!(engine.on_tick(&ActivityLabel::new("idle-coffee")).is_empty());
        assert!(engine.on_tick(&ActivityLabel::new("juggling")).is_empty());

        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn coding_ticks_feed_skill_overall_and_active_time() {
        let mut engine = engine();
        let coding = ActivityLabel::new("coding-night");

        let mut level_ups = Vec::new();
        for _ in 0..24 {
            level_ups.extend(engine.on_tick(&coding));
        }

        assert_eq!(
            level_ups,
            vec![LevelUp {
                kind: LevelKind::Skill,
                name: Some("coding".to_string()),
                new_level: 2,
            }]
        );
        let state = engine.state();
        assert_eq!(state.total_xp, 120);
        assert_eq!(state.level, 1);
        assert_eq!(state.total_active_ms, 24_000);
        assert_eq!(state.skills["coding"], SkillRecord { xp: 0, level: 2 });
    }

    #[test]
    fn success_grants_overall_xp_only() {
        let mut engine = engine();
        engine.on_tick(&ActivityLabel::new("success"));

        assert_eq!(engine.state().total_xp, 10);
        assert!(engine
            .state()
            .skills
            .values()
            .all(|record| *record == SkillRecord::default()));
    }

    #[test]
    fn overall_level_up_reaches_subscribers() {
        let mut engine = engine();
        let events = engine.subscribe();
        let success = ActivityLabel::new("success");

        for _ in 0..75 {
            engine.on_tick(&success);
        }

        let received: Vec<LevelUp> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![LevelUp {
                kind: LevelKind::Overall,
                name: None,
                new_level: 2,
            }]
        );
        assert_eq!(engine.snapshot().level, 2);
    }

    #[test]
    fn disconnected_subscribers_are_dropped() {
        let mut engine = engine();
        drop(engine.subscribe());
        let kept = engine.subscribe();

        for _ in 0..75 {
            engine.on_tick(&ActivityLabel::new("success"));
        }

        assert_eq!(engine.subscribers.len(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn flush_is_debounced_by_interval() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("progression.json");
        let mut engine = ProgressionEngine::load(
            ProgressionConfig::default(),
            ProgressionStore::new(&path),
            t0(),
        );
        engine.on_tick(&ActivityLabel::new("coding"));

        assert!(!engine.maybe_flush(t0() + Duration::seconds(5)));
        assert!(!path.exists());

        assert!(engine.maybe_flush(t0() + Duration::seconds(10)));
        assert!(path.exists());
        assert!(!engine.is_dirty());

        assert!(!engine.maybe_flush(t0() + Duration::seconds(30)));
    }

    #[test]
    fn shutdown_flushes_dirty_state() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("progression.json");
        let store = ProgressionStore::new(&path);
        let mut engine = ProgressionEngine::load(ProgressionConfig::default(), store.clone(), t0());
        engine.on_tick(&ActivityLabel::new("testing"));

        engine.shutdown(t0() + Duration::seconds(1));

        let persisted = store.read().unwrap().unwrap();
        assert_eq!(persisted.total_xp, 4);
        assert_eq!(persisted.skills["debugging"].xp, 4);
    }

    #[test]
    fn write_failure_is_swallowed_and_retried() {
        let temp = tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = temp.path().join("progression.json");
        std::fs::create_dir_all(path.join("blocker")).unwrap();
        let mut engine = ProgressionEngine::load(
            ProgressionConfig::default(),
            ProgressionStore::new(&path),
            t0(),
        );
        engine.on_tick(&ActivityLabel::new("coding"));

        engine.flush(t0() + Duration::seconds(10));

        assert!(engine.is_dirty());
        assert_eq!(engine.state().total_xp, 5);
    }
}
