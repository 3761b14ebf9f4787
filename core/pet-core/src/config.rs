//! Runtime configuration.
//!
//! Loaded from `~/.claude-pet/config.toml`. Every field has a default, so a
//! missing file, a missing section or a missing key all fall back silently.
//! A file that fails to parse is reported to the caller, which logs it and
//! runs on defaults.
//!
//! ```toml
//! [resolver]
//! tick_ms = 1000
//! dominance_secs = 120
//!
//! [revert]
//! quick_secs = 5
//! slow_secs = 120
//!
//! [observers.git]
//! enabled = true
//! repo_path = "/home/me/src/project"
//! ```

use chrono::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{PetError, Result};
use crate::messages::{MessageQueueConfig, DEFAULT_CAPACITY, DEFAULT_SETTLE_MS};
use crate::progression::{ProgressionConfig, DEFAULT_FLUSH_SECS, DEFAULT_PROGRESSION_TICK_MS};
use crate::status::{
    ResolverConfig, RevertPolicy, DEFAULT_DOMINANCE_SECS, DEFAULT_QUICK_REVERT_SECS,
    DEFAULT_SLOW_REVERT_SECS,
};

pub const DEFAULT_STATUS_TICK_MS: u64 = 1_000;
pub const DEFAULT_MESSAGE_TICK_MS: u64 = 200;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PetConfig {
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub revert: RevertSection,
    #[serde(default)]
    pub messages: MessagesSection,
    #[serde(default)]
    pub progression: ProgressionSection,
    #[serde(default)]
    pub observers: ObserversConfig,
}

impl PetConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            dominance: seconds_or_default(
                "resolver.dominance_secs",
                self.resolver.dominance_secs,
                DEFAULT_DOMINANCE_SECS,
            ),
        }
    }

    pub fn revert_policy(&self) -> RevertPolicy {
        RevertPolicy {
            quick: seconds_or_default(
                "revert.quick_secs",
                self.revert.quick_secs,
                DEFAULT_QUICK_REVERT_SECS,
            ),
            slow: seconds_or_default(
                "revert.slow_secs",
                self.revert.slow_secs,
                DEFAULT_SLOW_REVERT_SECS,
            ),
        }
    }

    pub fn message_queue_config(&self) -> MessageQueueConfig {
        MessageQueueConfig {
            capacity: self.messages.capacity,
            settle: millis_or_default(
                "messages.settle_ms",
                self.messages.settle_ms,
                DEFAULT_SETTLE_MS,
            ),
        }
    }

    pub fn progression_config(&self) -> ProgressionConfig {
        ProgressionConfig {
            tick: millis_or_default(
                "progression.tick_ms",
                self.progression.tick_ms,
                DEFAULT_PROGRESSION_TICK_MS,
            ),
            flush_interval: seconds_or_default(
                "progression.flush_secs",
                self.progression.flush_secs,
                DEFAULT_FLUSH_SECS,
            ),
        }
    }

    pub fn status_tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.resolver.tick_ms.max(1))
    }

    pub fn message_tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.messages.tick_ms.max(1))
    }

    pub fn progression_tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.progression.tick_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverSection {
    #[serde(default = "default_status_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_dominance_secs")]
    pub dominance_secs: u64,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            tick_ms: default_status_tick_ms(),
            dominance_secs: default_dominance_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevertSection {
    #[serde(default = "default_quick_secs")]
    pub quick_secs: u64,
    #[serde(default = "default_slow_secs")]
    pub slow_secs: u64,
}

impl Default for RevertSection {
    fn default() -> Self {
        Self {
            quick_secs: default_quick_secs(),
            slow_secs: default_slow_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_message_tick_ms")]
    pub tick_ms: u64,
}

impl Default for MessagesSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            settle_ms: default_settle_ms(),
            tick_ms: default_message_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionSection {
    #[serde(default = "default_progression_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_flush_secs")]
    pub flush_secs: u64,
}

impl Default for ProgressionSection {
    fn default() -> Self {
        Self {
            tick_ms: default_progression_tick_ms(),
            flush_secs: default_flush_secs(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Observers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObserversConfig {
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub chat: FeedConfig,
    #[serde(default)]
    pub music: FeedConfig,
    #[serde(default)]
    pub weather: FeedConfig,
    #[serde(default)]
    pub notifications: FeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdleConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_idle_threshold_secs")]
    pub threshold_secs: u64,
    #[serde(default)]
    pub rank: Option<u8>,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_secs: default_idle_threshold_secs(),
            rank: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_cpu_high_threshold")]
    pub cpu_high_threshold: f32,
    #[serde(default)]
    pub rank: Option<u8>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_high_threshold: default_cpu_high_threshold(),
            rank: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Foreground process name → activity label.
    #[serde(default = "default_process_map")]
    pub process_map: BTreeMap<String, String>,
    #[serde(default)]
    pub rank: Option<u8>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process_map: default_process_map(),
            rank: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub repo_path: Option<PathBuf>,
    #[serde(default)]
    pub rank: Option<u8>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub watch_path: Option<PathBuf>,
    #[serde(default)]
    pub rank: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default)]
    pub rank: Option<u8>,
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            work_minutes: default_work_minutes(),
            break_minutes: default_break_minutes(),
            rank: None,
        }
    }
}

/// Push-fed sources (chat, music, weather, notifications).
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub enabled: bool,
    /// How long a pushed observation holds before it lapses.
    #[serde(default = "default_feed_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub rank: Option<u8>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_feed_ttl_secs(),
            rank: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

fn enabled() -> bool {
    true
}

fn default_status_tick_ms() -> u64 {
    DEFAULT_STATUS_TICK_MS
}

fn default_dominance_secs() -> u64 {
    DEFAULT_DOMINANCE_SECS as u64
}

fn default_quick_secs() -> u64 {
    DEFAULT_QUICK_REVERT_SECS as u64
}

fn default_slow_secs() -> u64 {
    DEFAULT_SLOW_REVERT_SECS as u64
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS as u64
}

fn default_message_tick_ms() -> u64 {
    DEFAULT_MESSAGE_TICK_MS
}

fn default_progression_tick_ms() -> u64 {
    DEFAULT_PROGRESSION_TICK_MS as u64
}

fn default_flush_secs() -> u64 {
    DEFAULT_FLUSH_SECS as u64
}

fn default_idle_threshold_secs() -> u64 {
    60
}

fn default_cpu_high_threshold() -> f32 {
    80.0
}

fn default_work_minutes() -> u32 {
    25
}

fn default_break_minutes() -> u32 {
    5
}

fn default_feed_ttl_secs() -> u64 {
    30
}

fn default_process_map() -> BTreeMap<String, String> {
    [
        ("code", "coding"),
        ("codium", "coding"),
        ("nvim", "coding"),
        ("gnome-terminal-", "coding"),
        ("alacritty", "coding"),
        ("kitty", "coding"),
        ("wezterm-gui", "coding"),
        ("firefox", "searching"),
        ("chrome", "searching"),
        ("chromium", "searching"),
        ("msedge", "searching"),
        ("spotify", "idle-dancing"),
        ("slack", "reading"),
        ("discord", "reading"),
        ("obsidian", "reading"),
        ("whatsapp", "idle"),
    ]
    .into_iter()
    .map(|(process, label)| (process.to_string(), label.to_string()))
    .collect()
}

/// Values chrono can't represent fall back to the default.
fn seconds_or_default(key: &str, value: u64, default: i64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| {
            warn!(key, value, default, "Config duration out of range; using default");
            Duration::seconds(default)
        })
}

fn millis_or_default(key: &str, value: u64, default: i64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_milliseconds)
        .unwrap_or_else(|| {
            warn!(key, value, default, "Config duration out of range; using default");
            Duration::milliseconds(default)
        })
}

/// Reads the config file. A missing file yields defaults; unreadable or
/// malformed content is an error for the caller to log.
pub fn load_config(path: &Path) -> Result<PetConfig> {
    if !path.exists() {
        return Ok(PetConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| PetError::Io {
        context: format!("reading config {}", path.display()),
        source,
    })?;
    toml::from_str::<PetConfig>(&content).map_err(|err| PetError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
