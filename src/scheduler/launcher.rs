use super::{DocumentId, RunToken};
use crate::error::LaunchError;
use std::io;
use std::path::PathBuf;

/// Everything needed to start one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
}

/// Why a process was started; echoed back with its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTag {
    Trace {
        document: DocumentId,
        token: RunToken,
    },
    Probe {
        interpreter: PathBuf,
    },
    Install {
        interpreter: PathBuf,
        document: DocumentId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// `code` is `None` when the process was ended by a signal.
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// Started, but waiting on it failed.
    Failed(String),
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ProcessOutcome::Exited { code: Some(0), .. })
    }

    /// Non-empty stdout and stderr joined by a newline, trimmed.
    pub fn combined_output(&self) -> String {
        match self {
            ProcessOutcome::Exited { stdout, stderr, .. } => [stdout.as_str(), stderr.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string(),
            ProcessOutcome::Failed(message) => message.clone(),
        }
    }
}

/// A finished process, delivered back to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub tag: LaunchTag,
    pub outcome: ProcessOutcome,
}

/// Handle to a started process.
pub trait RunningProcess {
    /// Ask the process to stop. Must be safe to call repeatedly and after the
    /// process has already exited; only a failed signal is an error.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts child processes. Completion is reported asynchronously as a
/// [`Completion`] through whatever channel the implementation was built with.
pub trait ProcessLauncher {
    fn launch(
        &mut self,
        spec: LaunchSpec,
        tag: LaunchTag,
    ) -> Result<Box<dyn RunningProcess>, LaunchError>;
}
