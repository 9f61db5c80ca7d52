use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Probing,
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    importable: Option<bool>,
    probing: bool,
    installing: bool,
}

/// Whether the tracer is importable, per resolved interpreter path.
///
/// Only probe and install completions write verdicts. Owned by the scheduler
/// and injected at construction so each test can start from a fresh store.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityStore {
    entries: HashMap<PathBuf, Entry>,
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a verdict already recorded for `interpreter`.
    pub fn with_verdict(interpreter: impl Into<PathBuf>, importable: bool) -> Self {
        let mut store = Self::new();
        store.entries.insert(
            interpreter.into(),
            Entry {
                importable: Some(importable),
                ..Entry::default()
            },
        );
        store
    }

    pub fn status(&self, interpreter: &Path) -> Availability {
        match self.entries.get(interpreter) {
            Some(Entry {
                importable: Some(true),
                ..
            }) => Availability::Available,
            Some(Entry {
                importable: Some(false),
                ..
            }) => Availability::Unavailable,
            Some(Entry { probing: true, .. }) => Availability::Probing,
            _ => Availability::Unknown,
        }
    }

    /// Returns false when a probe is already running for this path.
    pub fn begin_probe(&mut self, interpreter: &Path) -> bool {
        let entry = self.entries.entry(interpreter.to_path_buf()).or_default();
        if entry.probing {
            return false;
        }
        entry.probing = true;
        true
    }

    pub fn finish_probe(&mut self, interpreter: &Path, importable: bool) {
        let entry = self.entries.entry(interpreter.to_path_buf()).or_default();
        entry.probing = false;
        entry.importable = Some(importable);
    }

    /// Forget the verdict so the next request probes again.
    pub fn invalidate(&mut self, interpreter: &Path) {
        if let Some(entry) = self.entries.get_mut(interpreter) {
            entry.importable = None;
        }
    }

    pub fn is_installing(&self, interpreter: &Path) -> bool {
        self.entries
            .get(interpreter)
            .map(|e| e.installing)
            .unwrap_or(false)
    }

    /// Returns false when an installation is already running for this path.
    pub fn begin_install(&mut self, interpreter: &Path) -> bool {
        let entry = self.entries.entry(interpreter.to_path_buf()).or_default();
        if entry.installing {
            return false;
        }
        entry.installing = true;
        true
    }

    pub fn finish_install(&mut self, interpreter: &Path, success: bool) {
        let entry = self.entries.entry(interpreter.to_path_buf()).or_default();
        entry.installing = false;
        if success {
            entry.importable = Some(true);
        }
    }
}
