//! IPC protocol types and validation for pet-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.
//!
//! One request per connection, one JSON object per line:
//!
//! ```text
//! → {"protocol_version":1,"method":"hook_write","id":"h-1","params":{"label":"coding"}}
//! ← {"ok":true,"id":"h-1","data":{"accepted":true}}
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

pub const MAX_LABEL_LEN: usize = 64;
pub const MAX_MESSAGE_LEN: usize = 500;
pub const MAX_MESSAGE_DURATION_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetStatus,
    GetProgression,
    HookWrite,
    EnqueueMessage,
    Pomodoro,
    FeedPush,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

/// A direct status write from the hook channel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HookWriteParams {
    pub label: String,
    /// When the hook fired (RFC3339). Defaults to receipt time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl HookWriteParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        validate_label(&self.label)?;
        if let Some(recorded_at) = &self.recorded_at {
            if DateTime::parse_from_rfc3339(recorded_at).is_err() {
                return Err(ErrorInfo::new(
                    "invalid_timestamp",
                    "recorded_at must be RFC3339",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnqueueMessageParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub rich: bool,
}

impl EnqueueMessageParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.text.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "text is required"));
        }
        if self.text.chars().count() > MAX_MESSAGE_LEN {
            return Err(ErrorInfo::new(
                "invalid_text",
                format!("text must be {} characters or fewer", MAX_MESSAGE_LEN),
            ));
        }
        match self.duration_ms {
            Some(0) => Err(ErrorInfo::new(
                "invalid_duration",
                "duration_ms must be positive",
            )),
            Some(ms) if ms > MAX_MESSAGE_DURATION_MS => Err(ErrorInfo::new(
                "invalid_duration",
                format!("duration_ms must be {} or less", MAX_MESSAGE_DURATION_MS),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PomodoroParams {
    pub action: String,
}

impl PomodoroParams {
    pub const ACTIONS: [&'static str; 4] = ["start_work", "start_break", "reset", "toggle"];

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if Self::ACTIONS.contains(&self.action.as_str()) {
            Ok(())
        } else {
            Err(ErrorInfo::new(
                "invalid_action",
                format!("action must be one of {}", Self::ACTIONS.join(", ")),
            ))
        }
    }
}

/// An observation pushed into one of the feed sources (chat, music, ...).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedPushParams {
    pub source: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Reported once, then the feed goes quiet.
    #[serde(default)]
    pub one_shot: bool,
}

impl FeedPushParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        validate_identifier("source", &self.source)?;
        validate_label(&self.label)?;
        if let Some(message) = &self.message {
            if message.trim().is_empty() {
                return Err(ErrorInfo::new("invalid_text", "message must not be blank"));
            }
            if message.chars().count() > MAX_MESSAGE_LEN {
                return Err(ErrorInfo::new(
                    "invalid_text",
                    format!("message must be {} characters or fewer", MAX_MESSAGE_LEN),
                ));
            }
        }
        Ok(())
    }
}

pub fn parse_hook_write(params: Value) -> Result<HookWriteParams, ErrorInfo> {
    let parsed: HookWriteParams = parse_params(params, "hook_write")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_enqueue_message(params: Value) -> Result<EnqueueMessageParams, ErrorInfo> {
    let parsed: EnqueueMessageParams = parse_params(params, "enqueue_message")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_pomodoro(params: Value) -> Result<PomodoroParams, ErrorInfo> {
    let parsed: PomodoroParams = parse_params(params, "pomodoro")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_feed_push(params: Value) -> Result<FeedPushParams, ErrorInfo> {
    let parsed: FeedPushParams = parse_params(params, "feed_push")?;
    parsed.validate()?;
    Ok(parsed)
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Value,
    method: &str,
) -> Result<T, ErrorInfo> {
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("{} params are invalid: {}", method, err),
        )
    })
}

fn validate_label(label: &str) -> Result<(), ErrorInfo> {
    validate_identifier("label", label)
}

fn validate_identifier(field: &str, value: &str) -> Result<(), ErrorInfo> {
    let code = format!("invalid_{field}");
    if value.trim().is_empty() {
        return Err(ErrorInfo::new("missing_field", format!("{field} is required")));
    }
    if value.len() > MAX_LABEL_LEN {
        return Err(ErrorInfo::new(
            &code,
            format!("{field} must be {} characters or fewer", MAX_LABEL_LEN),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ErrorInfo::new(
            &code,
            format!("{field} may only contain letters, digits, '-' and '_'"),
        ));
    }
    Ok(())
}
