//! pet-hook: CLI that feeds Claude Code activity into the pet daemon.
//!
//! Called directly by Claude Code hooks configured in ~/.claude/settings.json,
//! and by people or scripts that want to poke the pet by hand.
//!
//! ## Subcommands
//!
//! - `handle <EVENT>`: Hook handler, reads the event JSON from stdin
//! - `set <LABEL>`: Write a label to the hook channel
//! - `say <TEXT>`: Queue a side message
//! - `status`: Print the resolved status
//! - `progress`: Print level, XP and skills
//! - `pomodoro <ACTION>`: Drive the pomodoro timer
//! - `feed <SOURCE> <LABEL>`: Push an observation into a feed (chat, music, ...)

mod daemon_client;
mod handle;
mod logging;

use clap::{Parser, Subcommand};
use pet_protocol::{EnqueueMessageParams, FeedPushParams, HookWriteParams, PomodoroParams};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "pet-hook")]
#[command(about = "Feeds Claude Code activity into the Claude Pet daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle {
        /// Hook event name; falls back to `hook_event_name` in the payload
        #[arg(value_name = "EVENT")]
        event: Option<String>,
    },

    /// Write an activity label to the hook channel
    Set {
        #[arg(value_name = "LABEL")]
        label: String,
    },

    /// Queue a side message
    Say {
        #[arg(value_name = "TEXT")]
        text: String,

        /// Shown as the message's sender
        #[arg(long)]
        source: Option<String>,

        /// Display time in milliseconds (derived from length when omitted)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Render with markup
        #[arg(long)]
        rich: bool,
    },

    /// Print the resolved status
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// Print level, XP and skills
    Progress {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// Drive the pomodoro timer (start_work, start_break, reset, toggle)
    Pomodoro {
        #[arg(value_name = "ACTION")]
        action: String,
    },

    /// Push an observation into an enabled feed (chat, music, weather, notifications)
    Feed {
        #[arg(value_name = "SOURCE")]
        source: String,

        #[arg(value_name = "LABEL")]
        label: String,

        /// Side message to forward with the observation
        #[arg(long)]
        message: Option<String>,

        /// Report once instead of holding until the feed's TTL lapses
        #[arg(long)]
        one_shot: bool,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle { event } => {
            // Hook failures must never disrupt the assistant: log and exit 0.
            if let Err(e) = handle::run(event.as_deref()) {
                tracing::warn!(error = %e, "pet-hook handle failed");
            }
        }
        command => {
            if let Err(e) = run_command(command) {
                tracing::error!(error = %e, "pet-hook command failed");
                eprintln!("pet-hook: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_command(command: Commands) -> Result<(), String> {
    match command {
        Commands::Handle { .. } => Ok(()),
        Commands::Set { label } => {
            HookWriteParams {
                label: label.clone(),
                recorded_at: None,
            }
            .validate()
            .map_err(|err| err.message)?;
            daemon_client::send_hook_write(&label)
        }
        Commands::Say {
            text,
            source,
            duration_ms,
            rich,
        } => {
            let params = EnqueueMessageParams {
                text,
                source,
                duration_ms,
                rich,
            };
            params.validate().map_err(|err| err.message)?;
            daemon_client::send_message(params)
        }
        Commands::Status { json } => {
            let data = daemon_client::get_status()?;
            println!("{}", if json { pretty(&data) } else { format_status(&data) });
            Ok(())
        }
        Commands::Progress { json } => {
            let data = daemon_client::get_progression()?;
            println!(
                "{}",
                if json { pretty(&data) } else { format_progress(&data) }
            );
            Ok(())
        }
        Commands::Pomodoro { action } => {
            let params = PomodoroParams { action };
            params.validate().map_err(|err| err.message)?;
            let data = daemon_client::send_pomodoro(&params.action)?;
            println!("{}", format_pomodoro(&data));
            Ok(())
        }
        Commands::Feed {
            source,
            label,
            message,
            one_shot,
        } => {
            let params = FeedPushParams {
                source,
                label,
                message,
                one_shot,
            };
            params.validate().map_err(|err| err.message)?;
            daemon_client::send_feed_push(params)
        }
    }
}

fn pretty(data: &Value) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
}

fn str_field<'a>(data: &'a Value, pointer: &str) -> &'a str {
    data.pointer(pointer).and_then(Value::as_str).unwrap_or("?")
}

fn u64_field(data: &Value, pointer: &str) -> u64 {
    data.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

fn format_status(data: &Value) -> String {
    let owner = match data.pointer("/status/source/name").and_then(Value::as_str) {
        Some(name) => name,
        None => str_field(data, "/status/source/kind"),
    };
    let mut out = format!(
        "{} ({}, since {})",
        str_field(data, "/status/label"),
        owner,
        str_field(data, "/status/since")
    );
    if data.pointer("/hook_active").and_then(Value::as_bool) == Some(true) {
        out.push_str(" [hook active]");
    }
    if let Some(text) = data.pointer("/message/text").and_then(Value::as_str) {
        out.push_str(&format!("\n{}: {}", str_field(data, "/message/source"), text));
    }
    out
}

fn format_progress(data: &Value) -> String {
    let mut out = format!(
        "Level {} (tier {}): {} XP, next level at {}",
        u64_field(data, "/level"),
        u64_field(data, "/tier"),
        u64_field(data, "/total_xp"),
        u64_field(data, "/next_level_at"),
    );
    if let Some(skills) = data.pointer("/skills").and_then(Value::as_array) {
        for skill in skills {
            out.push_str(&format!(
                "\n  {:<11} lv {:>2}  {}/{}",
                str_field(skill, "/name"),
                u64_field(skill, "/level"),
                u64_field(skill, "/xp"),
                u64_field(skill, "/next_level_at"),
            ));
        }
    }
    let active_mins = u64_field(data, "/total_active_ms") / 60_000;
    out.push_str(&format!(
        "\nActive {}m over {} sessions",
        active_mins,
        u64_field(data, "/sessions")
    ));
    out
}

fn format_pomodoro(data: &Value) -> String {
    let remaining = u64_field(data, "/remaining_secs");
    format!(
        "{} {}:{:02}",
        str_field(data, "/phase"),
        remaining / 60,
        remaining % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn handle_event_argument_is_optional() {
        let cli = Cli::try_parse_from(["pet-hook", "handle"]).unwrap();
        assert!(matches!(cli.command, Commands::Handle { event: None }));

        let cli = Cli::try_parse_from(["pet-hook", "handle", "Stop"]).unwrap();
        assert!(matches!(cli.command, Commands::Handle { event: Some(ref e) } if e == "Stop"));
    }

    #[test]
    fn say_accepts_options() {
        let cli = Cli::try_parse_from([
            "pet-hook",
            "say",
            "hello",
            "--source",
            "me",
            "--duration-ms",
            "2500",
            "--rich",
        ])
        .unwrap();
        match cli.command {
            Commands::Say {
                text,
                source,
                duration_ms,
                rich,
            } => {
                assert_eq!(text, "hello");
                assert_eq!(source.as_deref(), Some("me"));
                assert_eq!(duration_ms, Some(2500));
                assert!(rich);
            }
            _ => panic!("expected say"),
        }
    }

    #[test]
    fn feed_accepts_message_and_one_shot() {
        let cli = Cli::try_parse_from([
            "pet-hook",
            "feed",
            "chat",
            "reading",
            "--message",
            "New message from Sam",
            "--one-shot",
        ])
        .unwrap();
        match cli.command {
            Commands::Feed {
                source,
                label,
                message,
                one_shot,
            } => {
                assert_eq!(source, "chat");
                assert_eq!(label, "reading");
                assert_eq!(message.as_deref(), Some("New message from Sam"));
                assert!(one_shot);
            }
            _ => panic!("expected feed"),
        }
    }

    #[test]
    fn feed_rejects_bad_source_before_contacting_daemon() {
        let err = run_command(Commands::Feed {
            source: "chat room".to_string(),
            label: "reading".to_string(),
            message: None,
            one_shot: false,
        })
        .unwrap_err();
        assert!(err.contains("source"), "{err}");
    }

    #[test]
    fn set_rejects_bad_labels_before_contacting_daemon() {
        let err = run_command(Commands::Set {
            label: "two words".to_string(),
        })
        .unwrap_err();
        assert!(err.contains("label"), "{err}");
    }

    #[test]
    fn status_line_names_owner_and_message() {
        let data = json!({
            "status": {
                "label": "reading",
                "source": {"kind": "source", "name": "chat"},
                "since": "2026-03-01T12:00:00Z"
            },
            "hook_active": false,
            "message": {"text": "New mail", "source": "NOTIFICATIONS"}
        });
        assert_eq!(
            format_status(&data),
            "reading (chat, since 2026-03-01T12:00:00Z)\nNOTIFICATIONS: New mail"
        );
    }

    #[test]
    fn status_line_for_hook_owner() {
        let data = json!({
            "status": {"label": "coding", "source": {"kind": "hook"}, "since": "t"},
            "hook_active": true,
            "message": null
        });
        assert_eq!(format_status(&data), "coding (hook, since t) [hook active]");
    }

    #[test]
    fn progress_summary_lists_skills() {
        let data = json!({
            "total_xp": 450, "level": 2, "tier": 0, "next_level_at": 600,
            "skills": [{"name": "coding", "xp": 30, "level": 3, "next_level_at": 360}],
            "total_active_ms": 180_000, "sessions": 4
        });
        let text = format_progress(&data);
        assert!(text.starts_with("Level 2 (tier 0): 450 XP, next level at 600"));
        assert!(text.contains("coding      lv  3  30/360"));
        assert!(text.ends_with("Active 3m over 4 sessions"));
    }

    #[test]
    fn pomodoro_line_formats_remaining_time() {
        let data = json!({"phase": "work", "remaining_secs": 1499});
        assert_eq!(format_pomodoro(&data), "work 24:59");
    }
}
