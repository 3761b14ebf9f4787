//! Side-message queue.
//!
//! One message is visible at a time. Pending messages wait in a bounded FIFO;
//! when it overflows, the oldest *pending* message is dropped (never the one
//! on screen). The drain is a deterministic `tick(now)` state machine so the
//! owning task can drive it from a timer.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_SETTLE_MS: i64 = 600;

const MIN_DISPLAY_MS: i64 = 8_000;
const MAX_DISPLAY_MS: i64 = 18_000;
const BASE_DISPLAY_MS: i64 = 6_000;
const PER_WORD_MS: i64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub text: String,
    pub source: String,
    pub rich: bool,
    #[serde(skip)]
    pub duration: Option<Duration>,
}

impl Message {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            rich: false,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn rich(mut self) -> Self {
        self.rich = true;
        self
    }

    /// Explicit duration if given, else derived from the word count.
    pub fn display_duration(&self) -> Duration {
        self.duration.unwrap_or_else(|| derived_duration(&self.text))
    }
}

/// `max(8s, min(words * 0.5s + 6s, 18s))`
pub fn derived_duration(text: &str) -> Duration {
    let words = text.split_whitespace().count() as i64;
    let ms = (words * PER_WORD_MS + BASE_DISPLAY_MS).min(MAX_DISPLAY_MS);
    Duration::milliseconds(ms.max(MIN_DISPLAY_MS))
}

/// The message currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub shown_at: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    Shown(DisplayedMessage),
    Expired(DisplayedMessage),
    /// Pushed out of a full backlog before it was ever shown.
    Dropped(Message),
}

#[derive(Debug, Clone)]
pub struct MessageQueueConfig {
    pub capacity: usize,
    pub settle: Duration,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            settle: Duration::milliseconds(DEFAULT_SETTLE_MS),
        }
    }
}

/// Cloneable handle other threads use to enqueue messages.
#[derive(Debug, Clone)]
pub struct MessageSender(Sender<Message>);

impl MessageSender {
    pub fn send(&self, message: Message) -> bool {
        self.0.send(message).is_ok()
    }
}

pub struct MessageQueue {
    config: MessageQueueConfig,
    pending: VecDeque<Message>,
    showing: Option<DisplayedMessage>,
    settle_until: Option<DateTime<Utc>>,
    inbox_tx: Sender<Message>,
    inbox_rx: Receiver<Message>,
}

impl MessageQueue {
    pub fn new(config: MessageQueueConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            config: MessageQueueConfig {
                capacity: config.capacity.max(1),
                settle: config.settle,
            },
            pending: VecDeque::new(),
            showing: None,
            settle_until: None,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender(self.inbox_tx.clone())
    }

    /// Appends to the backlog. Returns the message dropped to make room, if any.
    pub fn enqueue(&mut self, message: Message) -> Option<Message> {
        let dropped = if self.pending.len() >= self.config.capacity {
            self.pending.pop_front()
        } else {
            None
        };
        self.pending.push_back(message);
        dropped
    }

    pub fn current(&self) -> Option<&DisplayedMessage> {
        self.showing.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<MessageEvent> {
        let mut events = Vec::new();

        while let Ok(message) = self.inbox_rx.try_recv() {
            if let Some(dropped) = self.enqueue(message) {
                events.push(MessageEvent::Dropped(dropped));
            }
        }

        if let Some(showing) = &self.showing {
            if now >= showing.until {
                self.settle_until = Some(showing.until + self.config.settle);
                if let Some(expired) = self.showing.take() {
                    events.push(MessageEvent::Expired(expired));
                }
            }
        }

        let settled = self.settle_until.map(|until| now >= until).unwrap_or(true);
        if self.showing.is_none() && settled {
            if let Some(message) = self.pending.pop_front() {
                let until = now + message.display_duration();
                let displayed = DisplayedMessage {
                    message,
                    shown_at: now,
                    until,
                };
                self.showing = Some(displayed.clone());
                self.settle_until = None;
                events.push(MessageEvent::Shown(displayed));
            }
        }

        events
    }
}
