//! Event handler for Claude Code hooks.
//!
//! Reads the hook payload from stdin, classifies it into an activity label
//! (see [`pet_core::hook`]) and writes that label to the daemon's hook
//! channel. Events that map to nothing are ignored.

use pet_core::hook::{label_for_event, HookInput};
use pet_core::ActivityLabel;
use std::env;
use std::io::{self, Read};

/// Set by the pet's own helper processes so their tool use is not mirrored.
const SKIP_ENV: &str = "PET_HOOK_SKIP";

pub fn run(event_arg: Option<&str>) -> Result<(), String> {
    if env::var(SKIP_ENV).map(|v| v == "1").unwrap_or(false) {
        let _ = io::stdin().read_to_end(&mut Vec::new());
        return Ok(());
    }

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;

    let hook_input = parse_input(&input)?;
    let Some(label) = resolve_label(event_arg, &hook_input) else {
        tracing::debug!(
            event = ?event_arg.or(hook_input.hook_event_name.as_deref()),
            "Event does not change the status"
        );
        return Ok(());
    };

    crate::daemon_client::send_hook_write(label.as_str())?;
    tracing::debug!(
        label = %label,
        session = ?hook_input.session_id,
        "Daemon accepted hook write"
    );
    Ok(())
}

fn parse_input(input: &str) -> Result<HookInput, String> {
    if input.trim().is_empty() {
        return Ok(HookInput::default());
    }
    serde_json::from_str(input).map_err(|e| format!("Failed to parse hook input: {}", e))
}

/// The command-line event name wins over the payload's `hook_event_name`.
fn resolve_label(event_arg: Option<&str>, input: &HookInput) -> Option<ActivityLabel> {
    let event = event_arg.or(input.hook_event_name.as_deref())?;
    label_for_event(event, input)
}
