use super::launcher::LaunchSpec;
use super::DocumentSnapshot;
use crate::error::LaunchError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Replaced by the path of a temporary copy of the source in tracer arguments.
pub const FILE_PLACEHOLDER: &str = "{file}";

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w.]+").expect("file name pattern"));

/// How runs, probes and installs are launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub interpreter: PathBuf,
    pub debounce: Duration,
    pub tracer_module: String,
    pub tracer_args: Vec<String>,
    pub install_args: Vec<String>,
    pub workspace_root: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python"),
            debounce: Duration::from_millis(300),
            tracer_module: "space_tracer".to_string(),
            tracer_args: vec![
                "-m".to_string(),
                "space_tracer".to_string(),
                FILE_PLACEHOLDER.to_string(),
            ],
            install_args: vec![
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "space_tracer".to_string(),
            ],
            workspace_root: None,
        }
    }
}

/// Workspace root when known, else the document's own directory.
pub fn working_dir(options: &RunOptions, snapshot: &DocumentSnapshot) -> Option<PathBuf> {
    options.workspace_root.clone().or_else(|| {
        snapshot
            .path
            .as_ref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
    })
}

/// Sanitized file name for the temp copy; untitled documents use their id.
pub fn source_file_name(snapshot: &DocumentSnapshot) -> String {
    let name = snapshot
        .path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.py", snapshot.id));
    UNSAFE_NAME_CHARS.replace_all(&name, "_").into_owned()
}

/// Per-document directory under the OS temp dir holding the `{file}` copy.
/// The directory and its contents are removed on drop.
#[derive(Debug)]
pub struct SourceScratch {
    dir: TempDir,
}

impl SourceScratch {
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("live_trace_").tempdir()?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Keeps the document's own file name so tracebacks still show it.
    pub fn source_path(&self, snapshot: &DocumentSnapshot) -> PathBuf {
        self.dir.path().join(source_file_name(snapshot))
    }
}

/// Tracer invocation for one snapshot. The source always goes to stdin; a
/// temp copy is written only when the arguments ask for `{file}`, inside
/// `scratch` (created on first use).
pub fn trace_spec(
    options: &RunOptions,
    snapshot: &DocumentSnapshot,
    scratch: &mut Option<SourceScratch>,
) -> Result<LaunchSpec, LaunchError> {
    let mut args = options.tracer_args.clone();

    if args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
        let dir = match scratch.take() {
            Some(dir) => dir,
            None => SourceScratch::create().map_err(|source| LaunchError::SourceCopy {
                path: std::env::temp_dir(),
                source,
            })?,
        };
        let dir = scratch.insert(dir);
        let path = dir.source_path(snapshot);
        fs::write(&path, &snapshot.text).map_err(|source| LaunchError::SourceCopy {
            path: path.clone(),
            source,
        })?;
        let file = path.to_string_lossy();
        for arg in &mut args {
            *arg = arg.replace(FILE_PLACEHOLDER, &file);
        }
    }

    Ok(LaunchSpec {
        program: options.interpreter.clone(),
        args,
        cwd: working_dir(options, snapshot),
        stdin: Some(snapshot.text.clone()),
    })
}

/// `<interpreter> -c "import <module>"`: exit code 0 means importable.
pub fn probe_spec(options: &RunOptions) -> LaunchSpec {
    LaunchSpec {
        program: options.interpreter.clone(),
        args: vec![
            "-c".to_string(),
            format!("import {}", options.tracer_module),
        ],
        cwd: None,
        stdin: None,
    }
}

pub fn install_spec(options: &RunOptions) -> LaunchSpec {
    LaunchSpec {
        program: options.interpreter.clone(),
        args: options.install_args.clone(),
        cwd: options.workspace_root.clone(),
        stdin: None,
    }
}
