//! End-to-end status pipeline: sources and hook writes in, resolved status,
//! side messages and progression out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pet_core::observers::{FeedSource, PomodoroAction, PomodoroSource};
use pet_core::{
    ActivityLabel, Message, MessageEvent, MessageQueue, MessageQueueConfig, Observation,
    PriorityRank, ProgressionConfig, ProgressionEngine, ProgressionStore, ResolverConfig,
    RevertPolicy, SourceId, StatusEngine, StatusResolver,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn engine_with_feeds(feeds: Vec<(PriorityRank, FeedSource)>) -> StatusEngine {
    let mut resolver = StatusResolver::new(ResolverConfig::default(), t0());
    for (rank, feed) in feeds {
        resolver.register(rank, Box::new(feed));
    }
    StatusEngine::new(resolver, RevertPolicy::default())
}

#[test]
fn hook_success_reverts_quickly_then_sources_take_over_after_dominance() {
    let music = FeedSource::new("music", Duration::hours(1));
    let music_feed = music.handle();
    let mut engine = engine_with_feeds(vec![(PriorityRank::MUSIC, music)]);
    music_feed.push(Observation::label("idle-dancing"), t0());

    engine.resolver.hook_sender().write("success", t0());
    assert_eq!(engine.tick(at(0)).status.label.as_str(), "success");
    assert_eq!(engine.tick(at(5)).status.label.as_str(), "success");

    let reverted = engine.tick(at(6));
    assert!(reverted.changed);
    assert!(reverted.status.label.is_baseline());

    for secs in [30, 90, 119] {
        let outcome = engine.tick(at(secs));
        assert!(outcome.hook_active);
        assert!(outcome.status.label.is_baseline());
    }

    let after = engine.tick(at(120));
    assert_eq!(after.status.label.as_str(), "idle-dancing");
    assert_eq!(after.status.source, SourceId::source("music"));
}

#[test]
fn held_work_survives_then_reverts_once_released() {
    let chat = FeedSource::new("chat", Duration::hours(1));
    let chat_feed = chat.handle();
    let mut engine = engine_with_feeds(vec![(PriorityRank::CHAT, chat)]);
    chat_feed.push(Observation::label("reading"), t0());

    for secs in [0, 60, 121, 200] {
        assert_eq!(engine.tick(at(secs)).status.label.as_str(), "reading");
    }

    chat_feed.clear();
    let released = engine.tick(at(201));
    assert!(released.changed);
    assert!(released.status.label.is_baseline());
    assert_eq!(released.status.source, SourceId::Baseline);
}

#[test]
fn source_messages_flow_into_the_queue_once() {
    let notifications = FeedSource::new("notifications", Duration::seconds(30));
    let feed = notifications.handle();
    let mut engine = engine_with_feeds(vec![(PriorityRank::NOTIFICATIONS, notifications)]);
    let mut queue = MessageQueue::new(MessageQueueConfig::default());
    feed.push(
        Observation::label("reading").with_message("Build finished on CI"),
        t0(),
    );

    let mut shown = Vec::new();
    for secs in 0..5 {
        let outcome = engine.tick(at(secs));
        if let Some(message) = outcome.message {
            queue.enqueue(message);
        }
        for event in queue.tick(at(secs)) {
            if let MessageEvent::Shown(displayed) = event {
                shown.push(displayed.message);
            }
        }
    }

    assert_eq!(
        shown,
        vec![Message::new("Build finished on CI", "NOTIFICATIONS")]
    );
}

#[test]
fn user_messages_survive_a_running_pomodoro() {
    let pomodoro = PomodoroSource::new(25, 5);
    pomodoro.handle().apply(PomodoroAction::StartWork, t0());
    let mut resolver = StatusResolver::new(ResolverConfig::default(), t0());
    resolver.register(PriorityRank::POMODORO, Box::new(pomodoro));
    let mut engine = StatusEngine::new(resolver, RevertPolicy::default());
    let mut queue = MessageQueue::new(MessageQueueConfig::default());
    let user = queue.sender();

    let mut sent = Vec::new();
    let mut shown = Vec::new();
    let mut dropped = Vec::new();
    for secs in 0..240 {
        if let Some(message) = engine.tick(at(secs)).message {
            queue.enqueue(message);
        }
        if secs < 120 && secs % 10 == 0 {
            let text = format!("note {secs}");
            user.send(Message::new(text.clone(), "USER"));
            sent.push(text);
        }
        for event in queue.tick(at(secs)) {
            match event {
                MessageEvent::Shown(displayed) => shown.push(displayed.message),
                MessageEvent::Dropped(message) => dropped.push(message),
                MessageEvent::Expired(_) => {}
            }
        }
    }

    assert!(dropped.is_empty(), "dropped: {dropped:?}");
    let shown_user: Vec<String> = shown
        .iter()
        .filter(|message| message.source == "USER")
        .map(|message| message.text.clone())
        .collect();
    assert_eq!(shown_user, sent);
    assert!(shown
        .iter()
        .any(|message| message.source == "POMODORO" && message.text == "Work: 24:00"));
}

#[test]
fn progression_credits_what_the_status_engine_resolves() {
    let chat = FeedSource::new("chat", Duration::hours(1));
    let chat_feed = chat.handle();
    let mut engine = engine_with_feeds(vec![(PriorityRank::CHAT, chat)]);
    let mut progression = ProgressionEngine::load(
        ProgressionConfig::default(),
        ProgressionStore::new_in_memory(),
        t0(),
    );
    chat_feed.push(Observation::label("reading"), t0());

    for secs in 0..60 {
        let status = engine.tick(at(secs)).status;
        progression.on_tick(&status.label);
    }
    progression.on_tick(&ActivityLabel::baseline());

    let snapshot = progression.snapshot();
    assert_eq!(snapshot.total_xp, 120);
    assert_eq!(snapshot.total_active_ms, 60_000);
    let research = snapshot
        .skills
        .iter()
        .find(|skill| skill.name == "research")
        .unwrap();
    assert_eq!((research.level, research.xp), (2, 0));
}
