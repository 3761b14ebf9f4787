//! File logging for pet-hook.
//!
//! stdout and stderr belong to the hook host, so logs go to a daily-rolling
//! file under `~/.claude-pet/logs/`. Verbosity follows `RUST_LOG`, default
//! `warn`; `PET_DEBUG_LOG=1` forces `debug`.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use pet_core::StorageConfig;

const LOG_FILE_PREFIX: &str = "pet-hook.log";

/// Installs the subscriber. The returned guard must live until exit so
/// buffered lines are written. `None` means logging is off.
pub fn init() -> Option<WorkerGuard> {
    let logs_dir = StorageConfig::from_home().ok()?.logs_dir();
    fs_err::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let debug_enabled = env::var("PET_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}
