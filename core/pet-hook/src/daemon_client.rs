//! Client helper for talking to the pet daemon.
//!
//! The daemon is the only writer. Failures are returned to the caller, which
//! decides whether they matter (hook handling never blocks the host on them).

use chrono::Utc;
use pet_core::StorageConfig;
use pet_protocol::{
    EnqueueMessageParams, FeedPushParams, HookWriteParams, Method, PomodoroParams, Request,
    Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use rand::RngCore;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const SOCKET_ENV: &str = "PET_DAEMON_SOCKET";
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

pub fn send_hook_write(label: &str) -> Result<(), String> {
    let params = HookWriteParams {
        label: label.to_string(),
        recorded_at: Some(Utc::now().to_rfc3339()),
    };
    let params = serde_json::to_value(params)
        .map_err(|err| format!("Failed to serialize hook write: {}", err))?;
    request_with_retry(Method::HookWrite, Some(params), "hook write").map(|_| ())
}

pub fn send_message(params: EnqueueMessageParams) -> Result<(), String> {
    let params = serde_json::to_value(params)
        .map_err(|err| format!("Failed to serialize message: {}", err))?;
    request_with_retry(Method::EnqueueMessage, Some(params), "message").map(|_| ())
}

pub fn send_pomodoro(action: &str) -> Result<Value, String> {
    let params = serde_json::to_value(PomodoroParams {
        action: action.to_string(),
    })
    .map_err(|err| format!("Failed to serialize pomodoro action: {}", err))?;
    request_with_retry(Method::Pomodoro, Some(params), "pomodoro action")
}

pub fn send_feed_push(params: FeedPushParams) -> Result<(), String> {
    let params = serde_json::to_value(params)
        .map_err(|err| format!("Failed to serialize feed push: {}", err))?;
    request_with_retry(Method::FeedPush, Some(params), "feed push").map(|_| ())
}

pub fn get_status() -> Result<Value, String> {
    request_with_retry(Method::GetStatus, None, "status query")
}

pub fn get_progression() -> Result<Value, String> {
    request_with_retry(Method::GetProgression, None, "progression query")
}

fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    StorageConfig::from_home()
        .map(|storage| storage.socket_file())
        .map_err(String::from)
}

/// Sends once and retries once after a short delay. Both attempts carry the
/// same request id.
fn request_with_retry(
    method: Method,
    params: Option<Value>,
    label: &str,
) -> Result<Value, String> {
    let id = make_request_id();
    let build = || Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(id.clone()),
        params: params.clone(),
    };

    match send_and_unwrap(build()) {
        Ok(data) => Ok(data),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to send {} to daemon", label);
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_and_unwrap(build()).map_err(|retry_err| {
                tracing::warn!(
                    error = %retry_err,
                    "Retry failed sending {} to daemon",
                    label
                );
                retry_err
            })
        }
    }
}

fn send_and_unwrap(request: Request) -> Result<Value, String> {
    let response = send_request(request)?;
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        let message = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string());
        Err(message)
    }
}

fn send_request(request: Request) -> Result<Response, String> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket)
        .map_err(|err| format!("Failed to connect to daemon socket: {}", err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id() -> String {
    let mut random = rand::thread_rng();
    format!(
        "req-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        random.next_u64()
    )
}
