//! One periodic thread per owned entity.
//!
//! ```text
//! status task       StatusEngine::tick ─► SharedState.status
//!                          └─ side messages ──────────┐
//! message task      MessageQueue::tick ◄──────────────┘ ─► SharedState.message
//! progression task  on_tick(SharedState.status.label) ─► SharedState.progression
//!                          └─ level-up messages ─► MessageQueue
//! ```
//!
//! Every loop exits once shutdown is requested and runs its own cleanup.

use chrono::Utc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use pet_core::{
    LevelKind, LevelUp, Message, MessageEvent, MessageQueue, MessageSender, ProgressionEngine,
    StatusEngine,
};

use crate::shutdown;
use crate::state::SharedState;

const PROGRESSION_MESSAGE_SOURCE: &str = "PROGRESS";

pub fn spawn_status_task(
    mut engine: StatusEngine,
    messages: MessageSender,
    state: Arc<SharedState>,
    tick: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        engine.resolver.start_all();
        loop {
            let outcome = engine.tick(Utc::now());
            if outcome.changed {
                info!(
                    label = %outcome.status.label,
                    source = %outcome.status.source,
                    "Status changed"
                );
            }
            if let Some(message) = outcome.message.clone() {
                if !messages.send(message) {
                    warn!("Message queue is gone; dropping side message");
                }
            }
            state.publish_status(&outcome);

            if !shutdown::sleep_unless_requested(tick) {
                break;
            }
        }
        engine.resolver.stop_all();
        info!("Status task stopped");
    })
}

pub fn spawn_message_task(
    mut queue: MessageQueue,
    state: Arc<SharedState>,
    tick: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            for event in queue.tick(Utc::now()) {
                match event {
                    MessageEvent::Shown(displayed) => debug!(
                        source = %displayed.message.source,
                        text = %displayed.message.text,
                        until = %displayed.until,
                        "Message shown"
                    ),
                    MessageEvent::Expired(displayed) => {
                        debug!(source = %displayed.message.source, "Message expired")
                    }
                    MessageEvent::Dropped(message) => warn!(
                        source = %message.source,
                        text = %message.text,
                        "Message queue full; dropped oldest pending message"
                    ),
                }
            }
            state.publish_message(queue.current(), queue.pending_len());

            if !shutdown::sleep_unless_requested(tick) {
                break;
            }
        }
        info!("Message task stopped");
    })
}

pub fn spawn_progression_task(
    mut engine: ProgressionEngine,
    messages: MessageSender,
    state: Arc<SharedState>,
    tick: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        state.publish_progression(engine.snapshot());
        while shutdown::sleep_unless_requested(tick) {
            let label = state.current_label();
            let level_ups = engine.on_tick(&label);
            announce_level_ups(&messages, &level_ups);
            engine.maybe_flush(Utc::now());
            state.publish_progression(engine.snapshot());
        }
        engine.shutdown(Utc::now());
        info!("Progression task stopped");
    })
}

/// Queues one message per level-up. Returns how many the queue accepted.
fn announce_level_ups(messages: &MessageSender, level_ups: &[LevelUp]) -> usize {
    let mut delivered = 0;
    for level_up in level_ups {
        if messages.send(level_up_message(level_up)) {
            delivered += 1;
        } else {
            warn!(level = level_up.new_level, "Message queue is gone; dropping level-up message");
        }
    }
    delivered
}

fn level_up_message(level_up: &LevelUp) -> Message {
    let text = match (level_up.kind, level_up.name.as_deref()) {
        (LevelKind::Skill, Some(skill)) => {
            format!("{} reached level {}!", capitalize(skill), level_up.new_level)
        }
        _ => format!("LEVEL UP! Now level {}", level_up.new_level),
    };
    Message::new(text, PROGRESSION_MESSAGE_SOURCE).rich()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_level_up_names_the_skill() {
        let message = level_up_message(&LevelUp {
            kind: LevelKind::Skill,
            name: Some("research".to_string()),
            new_level: 3,
        });
        assert_eq!(message.text, "Research reached level 3!");
        assert_eq!(message.source, "PROGRESS");
        assert!(message.rich);
    }

    fn overall_level_up(new_level: u32) -> LevelUp {
        LevelUp {
            kind: LevelKind::Overall,
            name: None,
            new_level,
        }
    }

    #[test]
    fn level_ups_reach_the_queue() {
        let mut queue = MessageQueue::new(pet_core::MessageQueueConfig::default());
        let sender = queue.sender();

        let delivered = announce_level_ups(&sender, &[overall_level_up(2), overall_level_up(3)]);

        assert_eq!(delivered, 2);
        queue.tick(Utc::now());
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn level_ups_after_the_queue_is_gone_are_counted_as_dropped() {
        let queue = MessageQueue::new(pet_core::MessageQueueConfig::default());
        let sender = queue.sender();
        drop(queue);

        assert_eq!(announce_level_ups(&sender, &[overall_level_up(2)]), 0);
    }

    #[test]
    fn overall_level_up_uses_banner_text() {
        let message = level_up_message(&LevelUp {
            kind: LevelKind::Overall,
            name: None,
            new_level: 5,
        });
        assert_eq!(message.text, "LEVEL UP! Now level 5");
    }
}
