//! Builds the enabled sources from configuration.

use chrono::Duration;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use super::build::BuildProbe;
use super::feed::{FeedHandle, FeedSource};
use super::git::GitProbe;
use super::idle::IdleProbe;
use super::polled::PolledSource;
use super::pomodoro::{PomodoroHandle, PomodoroSource};
use super::system::{SystemLoadHandle, SystemProbe};
use super::window::WindowProbe;
use crate::config::{FeedConfig, ObserversConfig};
use crate::source::{ObservationSource, PriorityRank};
use crate::status::StatusResolver;

/// Control and read handles for sources that expose more than observations.
#[derive(Debug, Clone, Default)]
pub struct SourceHandles {
    pub pomodoro: Option<PomodoroHandle>,
    pub system_load: Option<SystemLoadHandle>,
    pub feeds: BTreeMap<String, FeedHandle>,
}

/// Sources in registration order, ready to hand to a resolver.
#[derive(Default)]
pub struct SourceSet {
    pub sources: Vec<(PriorityRank, Box<dyn ObservationSource>)>,
    pub handles: SourceHandles,
}

impl SourceSet {
    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|(_, source)| source.id()).collect()
    }

    pub fn register_into(self, resolver: &mut StatusResolver) -> SourceHandles {
        for (rank, source) in self.sources {
            resolver.register(rank, source);
        }
        self.handles
    }

    fn push(&mut self, rank: PriorityRank, source: Box<dyn ObservationSource>) {
        self.sources.push((rank, source));
    }
}

fn rank_or(overridden: Option<u8>, default: PriorityRank) -> PriorityRank {
    overridden.map(PriorityRank).unwrap_or(default)
}

/// Creates one source per enabled feature, in default rank order. Sources
/// that are enabled but missing a required path are skipped with a warning.
pub fn build_sources(config: &ObserversConfig) -> SourceSet {
    let mut set = SourceSet::default();

    if config.pomodoro.enabled {
        let source =
            PomodoroSource::new(config.pomodoro.work_minutes, config.pomodoro.break_minutes);
        set.handles.pomodoro = Some(source.handle());
        set.push(
            rank_or(config.pomodoro.rank, PriorityRank::POMODORO),
            Box::new(source),
        );
    }

    if config.git.enabled {
        match &config.git.repo_path {
            Some(repo_path) => set.push(
                rank_or(config.git.rank, PriorityRank::GIT),
                Box::new(PolledSource::new("git", GitProbe::new(repo_path.clone()))),
            ),
            None => warn!("Git observer enabled without repo_path; skipping"),
        }
    }

    if config.build.enabled {
        match &config.build.watch_path {
            Some(watch_path) => set.push(
                rank_or(config.build.rank, PriorityRank::BUILD),
                Box::new(PolledSource::new("build", BuildProbe::new(watch_path.clone()))),
            ),
            None => warn!("Build observer enabled without watch_path; skipping"),
        }
    }

    if config.window.enabled {
        set.push(
            rank_or(config.window.rank, PriorityRank::WINDOW),
            Box::new(PolledSource::new(
                "window",
                WindowProbe::new(config.window.process_map.clone()),
            )),
        );
    }

    push_feed(&mut set, "chat", &config.chat, PriorityRank::CHAT);

    if config.system.enabled {
        let probe = SystemProbe::new(config.system.cpu_high_threshold);
        set.handles.system_load = Some(probe.load_handle());
        set.push(
            rank_or(config.system.rank, PriorityRank::SYSTEM),
            Box::new(PolledSource::new("system", probe)),
        );
    }

    push_feed(
        &mut set,
        "notifications",
        &config.notifications,
        PriorityRank::NOTIFICATIONS,
    );
    push_feed(&mut set, "music", &config.music, PriorityRank::MUSIC);

    if config.idle.enabled {
        set.push(
            rank_or(config.idle.rank, PriorityRank::IDLE),
            Box::new(PolledSource::new(
                "idle",
                IdleProbe::new(StdDuration::from_secs(config.idle.threshold_secs)),
            )),
        );
    }

    push_feed(&mut set, "weather", &config.weather, PriorityRank::WEATHER);

    info!(sources = ?set.ids(), "Observation sources configured");
    set
}

fn push_feed(set: &mut SourceSet, id: &str, config: &FeedConfig, default_rank: PriorityRank) {
    if !config.enabled {
        return;
    }
    let source = FeedSource::new(id, Duration::seconds(config.ttl_secs as i64));
    set.handles.feeds.insert(id.to_string(), source.handle());
    set.push(rank_or(config.rank, default_rank), Box::new(source));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_enable_window_system_and_idle() {
        let set = build_sources(&ObserversConfig::default());

        assert_eq!(set.ids(), vec!["window", "system", "idle"]);
        assert!(set.handles.pomodoro.is_none());
        assert!(set.handles.system_load.is_some());
        let ranks: Vec<u8> = set.sources.iter().map(|(rank, _)| rank.0).collect();
        assert_eq!(ranks, vec![4, 5, 6]);
    }

    #[test]
    fn enabled_sources_follow_rank_order_and_overrides() {
        let mut config = ObserversConfig::default();
        config.pomodoro.enabled = true;
        config.git.enabled = true;
        config.git.repo_path = Some(PathBuf::from("/tmp/repo"));
        config.weather.enabled = true;
        config.weather.rank = Some(3);
        config.chat.enabled = true;

        let set = build_sources(&config);

        assert_eq!(
            set.ids(),
            vec!["pomodoro", "git", "window", "chat", "system", "idle", "weather"]
        );
        assert_eq!(set.sources.last().map(|(rank, _)| rank.0), Some(3));
        assert!(set.handles.pomodoro.is_some());
        assert!(set.handles.feeds.contains_key("chat"));
    }

    #[test]
    fn path_sources_without_paths_are_skipped() {
        let mut config = ObserversConfig::default();
        config.git.enabled = true;
        config.build.enabled = true;

        let set = build_sources(&config);

        assert!(!set.ids().contains(&"git"));
        assert!(!set.ids().contains(&"build"));
    }
}
