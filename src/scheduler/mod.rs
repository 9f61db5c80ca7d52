//! Decides when the tracer runs for each open document.
//!
//! The scheduler is a plain state machine: the host feeds it requests, clock
//! ticks and process completions, and reads back [`Notice`]s. It never blocks
//! and never owns a thread; [`SystemLauncher`] does the waiting on its behalf.

mod availability;
mod command;
mod delivery;
mod launcher;
mod process;
#[allow(clippy::module_inception)]
mod scheduler;
mod state;

pub use availability::{Availability, AvailabilityStore};
pub use command::{
    install_spec, probe_spec, source_file_name, trace_spec, working_dir, RunOptions,
    SourceScratch, FILE_PLACEHOLDER,
};
pub use delivery::{
    classify, indicates_missing_module, launch_failure_message, DeliveryKind, Notice,
    TraceDelivery, NO_OUTPUT,
};
pub use launcher::{
    Completion, LaunchSpec, LaunchTag, ProcessLauncher, ProcessOutcome, RunningProcess,
};
pub use process::{SystemLauncher, SystemProcess};
pub use scheduler::{NotRunReason, RunDecision, TraceScheduler};
pub use state::{Phase, RunState, TraceRun};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Host-assigned identity of an open document (a URI or an untitled name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId(s)
    }
}

/// Monotonic per-scheduler run counter. Only the document's latest token is
/// allowed to deliver a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    OnSave,
    OnChangeDebounced,
    Explicit,
}

/// Immutable view of a document at the moment a run was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub text: String,
    /// `None` for untitled documents.
    pub path: Option<PathBuf>,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<DocumentId>, text: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            path,
        }
    }
}
