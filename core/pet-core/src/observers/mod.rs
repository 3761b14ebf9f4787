//! Concrete observation sources.
//!
//! | Source        | Kind          | Default rank |
//! |---------------|---------------|--------------|
//! | pomodoro      | clock-driven  | 1            |
//! | git           | polled        | 2            |
//! | build         | polled        | 3            |
//! | window        | polled        | 4            |
//! | chat          | push feed     | 4            |
//! | system        | polled        | 5            |
//! | notifications | push feed     | 5            |
//! | music         | push feed     | 6            |
//! | idle          | polled        | 6            |
//! | weather       | push feed     | 7            |

pub mod build;
pub mod feed;
pub mod git;
pub mod idle;
pub mod polled;
pub mod pomodoro;
pub mod registry;
pub mod system;
pub mod window;

pub use feed::{FeedHandle, FeedSource};
pub use polled::{ObservationCache, PolledSource, Probe};
pub use pomodoro::{PomodoroAction, PomodoroHandle, PomodoroPhase, PomodoroSource, PomodoroStatus};
pub use registry::{build_sources, SourceHandles, SourceSet};
pub use system::{SystemLoad, SystemLoadHandle};

use std::path::Path;
use std::process::Command;

use crate::error::SourceError;

/// Runs a helper command and returns its stdout. A missing binary or a
/// non-zero exit is a [`SourceError`].
pub(crate) fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<String, SourceError> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command.output().map_err(|err| SourceError::CommandFailed {
        command: program.to_string(),
        details: err.to_string(),
    })?;
    if !output.status.success() {
        return Err(SourceError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
