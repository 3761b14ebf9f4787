//! Hook event classification.
//!
//! The assistant's hook system runs `pet-hook handle <EventName>` with the
//! event payload on stdin. This module maps that payload to the activity
//! label written to the hook channel.
//!
//! ```text
//! UserPromptSubmit   → thinking
//! PreToolUse         → classify_tool(tool_name, tool_input)
//! PostToolUseFailure → error
//! Stop               → success
//! Notification       → thinking
//! anything else      → (no write)
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::activity::ActivityLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    UserPromptSubmit,
    PreToolUse,
    PostToolUseFailure,
    Stop,
    Notification,
}

impl HookEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "UserPromptSubmit" => Some(Self::UserPromptSubmit),
            "PreToolUse" => Some(Self::PreToolUse),
            "PostToolUseFailure" => Some(Self::PostToolUseFailure),
            "Stop" => Some(Self::Stop),
            "Notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

/// The subset of the hook payload classification looks at.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
}

impl HookInput {
    fn tool_input_str(&self, key: &str) -> &str {
        self.tool_input
            .as_ref()
            .and_then(|input| input.get(key))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// Label for `event`, or `None` when the event should not touch the status.
pub fn label_for_event(event_name: &str, input: &HookInput) -> Option<ActivityLabel> {
    let label = match HookEvent::from_name(event_name)? {
        HookEvent::UserPromptSubmit | HookEvent::Notification => "thinking",
        HookEvent::PreToolUse => classify_tool(input),
        HookEvent::PostToolUseFailure => "error",
        HookEvent::Stop => "success",
    };
    Some(ActivityLabel::new(label))
}

const INSTALL_MARKERS: &[&str] = &[
    "npm install",
    "yarn add",
    "pip install",
    "apt install",
    "brew install",
    "cargo add",
    "pnpm add",
    "bun add",
];
const TEST_MARKERS: &[&str] = &[
    "npm test",
    "pytest",
    "jest",
    "vitest",
    "mocha",
    "cargo test",
    "go test",
    "unittest",
    "run test",
];
const DEPLOY_MARKERS: &[&str] = &["deploy", "publish", "push", "release", "ship"];
const DOWNLOAD_MARKERS: &[&str] = &["download", "curl", "wget", "fetch", "clone"];
const DELETE_MARKERS: &[&str] = &["rm ", "del ", "remove", "clean", "uninstall", "prune"];
const DEBUG_MARKERS: &[&str] = &["debug", "inspect"];
const BUILD_MARKERS: &[&str] = &["build", "compile", "make", "bundle", "cook"];

/// Bash keyword groups, checked in order; first match wins.
const BASH_RULES: &[(&[&str], &str)] = &[
    (INSTALL_MARKERS, "installing"),
    (TEST_MARKERS, "testing"),
    (DEPLOY_MARKERS, "deploying"),
    (DOWNLOAD_MARKERS, "downloading"),
    (DELETE_MARKERS, "deleting"),
    (DEBUG_MARKERS, "debugging"),
    (BUILD_MARKERS, "cooking"),
];

pub fn classify_tool(input: &HookInput) -> &'static str {
    match input.tool_name.as_deref().unwrap_or("") {
        "Bash" => {
            let text = format!(
                "{} {}",
                input.tool_input_str("command"),
                input.tool_input_str("description")
            )
            .to_lowercase();
            BASH_RULES
                .iter()
                .find(|(markers, _)| markers.iter().any(|marker| text.contains(marker)))
                .map(|(_, label)| *label)
                .unwrap_or("coding")
        }
        "Grep" | "Glob" | "WebSearch" => "searching",
        "Read" | "WebFetch" => "reading",
        "Write" | "Edit" | "NotebookEdit" => "coding",
        "Task" if input.tool_input_str("subagent_type").eq_ignore_ascii_case("explore") => {
            "searching"
        }
        _ => "thinking",
    }
}
