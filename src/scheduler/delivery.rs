use super::launcher::ProcessOutcome;
use super::{DocumentId, RunToken};
use crate::error::LaunchError;
use std::path::{Path, PathBuf};

/// Shown instead of an empty trace from a successful run.
pub const NO_OUTPUT: &str = "(no output)";

const PATH_HINT: &str = "Are you sure you have installed Python 3 and it is in your PATH?\n\
     You can download Python here: https://www.python.org/downloads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// Exit code 0.
    Output,
    /// Nonzero exit: the user's code failed. Rendered like normal output.
    UserError,
    /// The tracer could not be started or waited on.
    Infrastructure,
}

/// The authoritative result of the latest run for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceDelivery {
    pub kind: DeliveryKind,
    pub text: String,
    /// Source text the run was started with.
    pub source: String,
    pub interpreter: PathBuf,
}

/// Something the host should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    RunStarted {
        document: DocumentId,
        token: RunToken,
    },
    Delivered {
        document: DocumentId,
        token: RunToken,
        delivery: TraceDelivery,
    },
    InstallPrompt {
        document: DocumentId,
        interpreter: PathBuf,
        message: String,
    },
    InstallFinished {
        document: DocumentId,
        interpreter: PathBuf,
        success: bool,
        output: String,
    },
}

/// Map a finished process to `(kind, text)`.
pub fn classify(outcome: &ProcessOutcome) -> (DeliveryKind, String) {
    match outcome {
        ProcessOutcome::Exited {
            code: Some(0),
            stdout,
            ..
        } => {
            let text = if stdout.is_empty() {
                NO_OUTPUT.to_string()
            } else {
                stdout.clone()
            };
            (DeliveryKind::Output, text)
        }
        ProcessOutcome::Exited { code, .. } => {
            let combined = outcome.combined_output();
            let text = match (combined.is_empty(), code) {
                (false, Some(_)) => combined,
                (true, Some(code)) => format!("tracer exited with code {}", code),
                (false, None) => format!("{}\ntracer terminated by signal", combined),
                (true, None) => "tracer terminated by signal".to_string(),
            };
            (DeliveryKind::UserError, text)
        }
        ProcessOutcome::Failed(message) => (
            DeliveryKind::Infrastructure,
            format!("Failed to run tracer: {}", message),
        ),
    }
}

pub fn launch_failure_message(err: &LaunchError) -> String {
    let mut message = format!("Failed to start tracer: {}", err);
    if err.is_not_found() {
        message.push_str("\n\n");
        message.push_str(PATH_HINT);
    }
    message
}

pub fn install_prompt_message(module: &str, interpreter: &Path) -> String {
    format!(
        "`{}` is not importable with {}. Install it to see live traces.",
        module,
        interpreter.display()
    )
}

/// The run failed because the tracer module itself is missing.
pub fn indicates_missing_module(text: &str, module: &str) -> bool {
    text.contains(&format!("No module named {}", module))
        || text.contains(&format!("No module named '{}'", module))
}
