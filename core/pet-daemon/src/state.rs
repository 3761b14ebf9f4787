//! Snapshots shared between the periodic tasks and connection handlers.
//!
//! Each engine lives on its own task thread. Handlers never touch an engine
//! directly: they read the latest published snapshot, or send an input
//! through the engine's channel and let the owner apply it on its next tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use pet_core::observers::{PomodoroAction, PomodoroStatus, SourceHandles, SystemLoad};
use pet_core::{
    ActivityLabel, DisplayedMessage, HookSender, Message, MessageSender, Observation,
    ProgressionSnapshot, ResolvedStatus, TickOutcome,
};

/// What `get_status` returns.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: ResolvedStatus,
    pub hook_active: bool,
    pub message: Option<DisplayedMessage>,
    pub pending_messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pomodoro: Option<PomodoroStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemLoad>,
    pub sources: Vec<String>,
}

pub struct SharedState {
    status: RwLock<ResolvedStatus>,
    hook_active: AtomicBool,
    message: RwLock<Option<DisplayedMessage>>,
    pending_messages: AtomicUsize,
    progression: RwLock<ProgressionSnapshot>,
    hook: HookSender,
    messages: MessageSender,
    handles: SourceHandles,
    source_ids: Vec<String>,
    started_at: DateTime<Utc>,
}

impl SharedState {
    pub fn new(
        status: ResolvedStatus,
        progression: ProgressionSnapshot,
        hook: HookSender,
        messages: MessageSender,
        handles: SourceHandles,
        source_ids: Vec<String>,
    ) -> Self {
        let started_at = status.since;
        Self {
            status: RwLock::new(status),
            hook_active: AtomicBool::new(false),
            message: RwLock::new(None),
            pending_messages: AtomicUsize::new(0),
            progression: RwLock::new(progression),
            hook,
            messages,
            handles,
            source_ids,
            started_at,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing (task threads)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn publish_status(&self, outcome: &TickOutcome) {
        self.hook_active.store(outcome.hook_active, Ordering::Relaxed);
        if let Ok(mut status) = self.status.write() {
            *status = outcome.status.clone();
        }
    }

    pub fn publish_message(&self, current: Option<&DisplayedMessage>, pending: usize) {
        self.pending_messages.store(pending, Ordering::Relaxed);
        if let Ok(mut message) = self.message.write() {
            *message = current.cloned();
        }
    }

    pub fn publish_progression(&self, snapshot: ProgressionSnapshot) {
        if let Ok(mut progression) = self.progression.write() {
            *progression = snapshot;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn current_label(&self) -> ActivityLabel {
        self.status
            .read()
            .map(|status| status.label.clone())
            .unwrap_or_else(|_| ActivityLabel::baseline())
    }

    pub fn status_snapshot(&self, now: DateTime<Utc>) -> StatusSnapshot {
        let status = self
            .status
            .read()
            .map(|status| status.clone())
            .unwrap_or_else(|_| ResolvedStatus::baseline(now));
        let message = self
            .message
            .read()
            .map(|message| message.clone())
            .unwrap_or_default();

        StatusSnapshot {
            status,
            hook_active: self.hook_active.load(Ordering::Relaxed),
            message,
            pending_messages: self.pending_messages.load(Ordering::Relaxed),
            pomodoro: self.handles.pomodoro.as_ref().map(|handle| handle.status(now)),
            system: self.handles.system_load.as_ref().map(|handle| handle.get()),
            sources: self.source_ids.clone(),
        }
    }

    pub fn progression_snapshot(&self) -> Option<ProgressionSnapshot> {
        self.progression.read().map(|snapshot| snapshot.clone()).ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inputs (connection handlers)
    // ─────────────────────────────────────────────────────────────────────────

    /// Queues a hook write. The status task applies it on its next tick.
    pub fn hook_write(&self, label: ActivityLabel, at: DateTime<Utc>) -> bool {
        self.hook.write(label, at)
    }

    pub fn enqueue_message(&self, message: Message) -> bool {
        self.messages.send(message)
    }

    pub fn feed_names(&self) -> Vec<String> {
        self.handles.feeds.keys().cloned().collect()
    }

    /// Hands an observation to a feed source. False when no feed by that
    /// name is enabled.
    pub fn feed_push(
        &self,
        feed: &str,
        observation: Observation,
        one_shot: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(handle) = self.handles.feeds.get(feed) else {
            return false;
        };
        if one_shot {
            handle.push_one_shot(observation, now);
        } else {
            handle.push(observation, now);
        }
        true
    }

    /// `None` when the pomodoro source is disabled.
    pub fn pomodoro(&self, action: PomodoroAction, now: DateTime<Utc>) -> Option<PomodoroStatus> {
        self.handles
            .pomodoro
            .as_ref()
            .map(|handle| handle.apply(action, now))
    }
}
