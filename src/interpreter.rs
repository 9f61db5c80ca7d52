//! Picks the Python interpreter used to run the tracer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FALLBACK: &str = "python";

fn env_dir_candidates(dir: &Path, out: &mut Vec<PathBuf>) {
    if cfg!(windows) {
        out.push(dir.join("python.exe"));
        out.push(dir.join("Scripts").join("python.exe"));
    } else {
        out.push(dir.join("bin").join("python3"));
        out.push(dir.join("bin").join("python"));
    }
}

/// Candidate interpreters in priority order, de-duplicated case-insensitively.
///
/// `env` looks up an environment variable; it is a parameter so tests do not
/// have to touch the process environment.
pub fn candidates<F>(env: F, configured: Option<&Path>) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Vec::new();

    if let Some(exe) = env("PYTHON_EXECUTABLE").filter(|s| !s.is_empty()) {
        out.push(PathBuf::from(exe));
    }
    for var in ["CONDA_PREFIX", "VIRTUAL_ENV", "PYTHON_HOME"] {
        if let Some(dir) = env(var).filter(|s| !s.is_empty()) {
            env_dir_candidates(Path::new(&dir), &mut out);
        }
    }
    if let Some(path) = configured.filter(|p| !p.as_os_str().is_empty()) {
        out.push(path.to_path_buf());
    }
    out.push(PathBuf::from("python3"));
    out.push(PathBuf::from(FALLBACK));

    let mut seen = HashSet::new();
    out.retain(|p| seen.insert(p.to_string_lossy().to_lowercase()));
    out
}

/// Absolute (or relative-with-directory) paths must exist; bare names must be
/// found on PATH.
pub fn is_usable(candidate: &Path) -> bool {
    if candidate.components().count() > 1 || candidate.is_absolute() {
        candidate.is_file()
    } else {
        which::which(candidate).is_ok()
    }
}

/// First usable candidate, else [`FALLBACK`].
pub fn resolve(configured: Option<&Path>) -> PathBuf {
    resolve_with(|var| std::env::var(var).ok(), configured, is_usable)
}

pub fn resolve_with<F, U>(env: F, configured: Option<&Path>, usable: U) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
    U: Fn(&Path) -> bool,
{
    for candidate in candidates(env, configured) {
        if usable(&candidate) {
            debug!(interpreter = %candidate.display(), "interpreter resolved");
            return candidate;
        }
    }
    PathBuf::from(FALLBACK)
}
