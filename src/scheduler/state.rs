use super::launcher::RunningProcess;
use super::RunToken;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Where a document sits in the run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingDebounce { due: Instant },
    /// Waiting on an availability probe or an install.
    AwaitingAvailability,
    Running { token: RunToken },
}

/// Lifecycle of a single trace run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
    Superseded,
}

/// One execution attempt of the tracer.
pub struct TraceRun {
    pub token: RunToken,
    pub interpreter: PathBuf,
    pub source: String,
    pub state: RunState,
    process: Option<Box<dyn RunningProcess>>,
}

impl TraceRun {
    pub fn new(token: RunToken, interpreter: PathBuf, source: String) -> Self {
        Self {
            token,
            interpreter,
            source,
            state: RunState::Pending,
            process: None,
        }
    }

    pub fn start(&mut self, process: Box<dyn RunningProcess>) {
        self.process = Some(process);
        self.state = RunState::Running;
    }

    /// Kill the process if it is still around. Safe to call repeatedly. The
    /// run counts as superseded even when the kill itself fails.
    pub fn supersede(&mut self) -> io::Result<()> {
        let killed = match self.process.take() {
            Some(mut process) => process.kill(),
            None => Ok(()),
        };
        self.state = RunState::Superseded;
        killed
    }

    pub fn finish(&mut self, succeeded: bool) {
        self.process = None;
        self.state = if succeeded {
            RunState::Completed
        } else {
            RunState::Failed
        };
    }
}

impl fmt::Debug for TraceRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceRun")
            .field("token", &self.token)
            .field("interpreter", &self.interpreter)
            .field("state", &self.state)
            .finish()
    }
}
