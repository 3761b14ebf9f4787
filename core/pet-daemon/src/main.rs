//! Claude Pet daemon entrypoint.
//!
//! Single writer for the pet's status, side messages and progression. Each of
//! those engines runs on its own periodic thread; the socket listener only
//! reads published snapshots and forwards inputs through channels.

use chrono::{DateTime, Utc};
use fs_err as fs;
use std::env;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pet_core::observers::PomodoroAction;
use pet_core::{
    build_sources, load_config, ActivityLabel, Message, MessageQueue, Observation, PetConfig,
    ProgressionEngine, ProgressionStore, StatusEngine, StatusResolver, StorageConfig,
};
use pet_protocol::{
    parse_enqueue_message, parse_feed_push, parse_hook_write, parse_pomodoro, ErrorInfo, Method,
    Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use serde_json::Value;

mod shutdown;
mod state;
mod tasks;

use state::SharedState;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const ACCEPT_POLL_MS: u64 = 50;
const DEFAULT_MESSAGE_SOURCE: &str = "USER";

fn main() {
    init_logging();
    shutdown::install_signal_handlers();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve storage root");
            std::process::exit(1);
        }
    };

    let config = match load_config(&storage.config_file()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            PetConfig::default()
        }
    };

    let socket_path = storage.socket_file();
    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };
    if let Err(err) = listener.set_nonblocking(true) {
        error!(error = %err, "Failed to make daemon socket non-blocking");
        std::process::exit(1);
    }

    let now = Utc::now();
    let mut resolver = StatusResolver::new(config.resolver_config(), now);
    let source_set = build_sources(&config.observers);
    let source_ids: Vec<String> = source_set.ids().into_iter().map(str::to_string).collect();
    let handles = source_set.register_into(&mut resolver);

    let queue = MessageQueue::new(config.message_queue_config());
    let progression = ProgressionEngine::load(
        config.progression_config(),
        ProgressionStore::new(&storage.progression_file()),
        now,
    );

    let shared_state = Arc::new(SharedState::new(
        resolver.current().clone(),
        progression.snapshot(),
        resolver.hook_sender(),
        queue.sender(),
        handles,
        source_ids,
    ));

    let workers = vec![
        tasks::spawn_status_task(
            StatusEngine::new(resolver, config.revert_policy()),
            queue.sender(),
            Arc::clone(&shared_state),
            config.status_tick(),
        ),
        tasks::spawn_progression_task(
            progression,
            queue.sender(),
            Arc::clone(&shared_state),
            config.progression_tick(),
        ),
        tasks::spawn_message_task(queue, Arc::clone(&shared_state), config.message_tick()),
    ];

    info!(
        path = %socket_path.display(),
        sources = ?shared_state.source_ids(),
        "Claude Pet daemon started"
    );

    while !shutdown::requested() {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = stream.set_nonblocking(false) {
                    warn!(error = %err, "Failed to configure daemon connection");
                    continue;
                }
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(ACCEPT_POLL_MS));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }

    info!("Shutdown requested; stopping tasks");
    for worker in workers {
        if worker.join().is_err() {
            warn!("Daemon task panicked during shutdown");
        }
    }
    if let Err(err) = remove_existing_socket(&socket_path) {
        warn!(error = %err, "Failed to remove daemon socket on shutdown");
    }
    info!("Claude Pet daemon stopped");
}

fn init_logging() {
    let debug_enabled = env::var("PET_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state, Utc::now());
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => {
            if buffer.len() > index + 1 {
                let trailing = &buffer[index + 1..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    warn!("Extra bytes detected after newline; ignoring trailing data");
                }
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState, now: DateTime<Utc>) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => Response::ok(
            request.id,
            serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "started_at": state.started_at().to_rfc3339(),
                "sources": state.source_ids(),
            }),
        ),
        Method::GetStatus => match serde_json::to_value(state.status_snapshot(now)) {
            Ok(value) => Response::ok(request.id, value),
            Err(err) => Response::error(
                request.id,
                "serialization_error",
                format!("Failed to serialize status: {}", err),
            ),
        },
        Method::GetProgression => {
            let Some(snapshot) = state.progression_snapshot() else {
                return Response::error(
                    request.id,
                    "progression_unavailable",
                    "progression snapshot is unavailable",
                );
            };
            match serde_json::to_value(snapshot) {
                Ok(value) => Response::ok(request.id, value),
                Err(err) => Response::error(
                    request.id,
                    "serialization_error",
                    format!("Failed to serialize progression: {}", err),
                ),
            }
        }
        Method::HookWrite => handle_hook_write(request, state, now),
        Method::EnqueueMessage => handle_enqueue_message(request, state),
        Method::Pomodoro => handle_pomodoro(request, state, now),
        Method::FeedPush => handle_feed_push(request, state, now),
    }
}

fn require_params(request: &mut Request, what: &str) -> Result<Value, ErrorInfo> {
    request
        .params
        .take()
        .ok_or_else(|| ErrorInfo::new("invalid_params", format!("{} is required", what)))
}

fn handle_hook_write(mut request: Request, state: &SharedState, now: DateTime<Utc>) -> Response {
    let params = match require_params(&mut request, "label") {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };
    let parsed = match parse_hook_write(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    // Future timestamps are clamped to receipt time.
    let at = parsed
        .recorded_at
        .as_deref()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc).min(now))
        .unwrap_or(now);

    info!(label = %parsed.label, recorded_at = %at, "Received hook write");
    if !state.hook_write(ActivityLabel::new(parsed.label), at) {
        return Response::error(request.id, "status_unavailable", "status task is not running");
    }
    Response::ok(request.id, serde_json::json!({ "accepted": true }))
}

fn handle_enqueue_message(mut request: Request, state: &SharedState) -> Response {
    let params = match require_params(&mut request, "text") {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };
    let parsed = match parse_enqueue_message(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    let source = parsed
        .source
        .as_deref()
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .unwrap_or(DEFAULT_MESSAGE_SOURCE)
        .to_uppercase();
    let mut message = Message::new(parsed.text, source);
    if let Some(ms) = parsed.duration_ms {
        message = message.with_duration(chrono::Duration::milliseconds(ms as i64));
    }
    if parsed.rich {
        message = message.rich();
    }

    if !state.enqueue_message(message) {
        return Response::error(request.id, "queue_unavailable", "message task is not running");
    }
    Response::ok(request.id, serde_json::json!({ "accepted": true }))
}

fn handle_pomodoro(mut request: Request, state: &SharedState, now: DateTime<Utc>) -> Response {
    let params = match require_params(&mut request, "action") {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };
    let parsed = match parse_pomodoro(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(request.id, err),
    };
    let action = match parsed.action.parse::<PomodoroAction>() {
        Ok(action) => action,
        Err(err) => return Response::error(request.id, "invalid_action", err),
    };

    match state.pomodoro(action, now) {
        Some(status) => match serde_json::to_value(status) {
            Ok(value) => Response::ok(request.id, value),
            Err(err) => Response::error(
                request.id,
                "serialization_error",
                format!("Failed to serialize pomodoro status: {}", err),
            ),
        },
        None => Response::error(
            request.id,
            "pomodoro_disabled",
            "pomodoro is disabled in config.toml",
        ),
    }
}

fn handle_feed_push(mut request: Request, state: &SharedState, now: DateTime<Utc>) -> Response {
    let params = match require_params(&mut request, "source and label") {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };
    let parsed = match parse_feed_push(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    let mut observation = Observation::label(parsed.label.as_str());
    if let Some(message) = &parsed.message {
        observation = observation.with_message(message.as_str());
    }
    if !state.feed_push(&parsed.source, observation, parsed.one_shot, now) {
        let enabled = state.feed_names();
        let enabled = if enabled.is_empty() {
            "none".to_string()
        } else {
            enabled.join(", ")
        };
        return Response::error(
            request.id,
            "unknown_feed",
            format!("feed '{}' is not enabled (enabled: {})", parsed.source, enabled),
        );
    }

    info!(
        feed = %parsed.source,
        label = %parsed.label,
        one_shot = parsed.one_shot,
        "Received feed push"
    );
    Response::ok(request.id, serde_json::json!({ "accepted": true }))
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
