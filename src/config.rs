//! Settings file handling.
//!
//! Settings live in a TOML file. Every field is optional; missing fields keep
//! their defaults, so an empty file is a valid configuration.

use crate::error::ConfigError;
use crate::render::DisplayFlags;
use crate::scheduler::{RunOptions, FILE_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.toml";
const APP_DIR: &str = "live-trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenToExecute {
    /// Edits schedule a debounced run.
    AfterDelay,
    /// Only saves (and explicit requests) run the tracer.
    OnSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDelivery {
    /// Source on stdin, plus a temp copy for `{file}` arguments.
    StdinAndFile,
    /// Source on stdin only; `{file}` arguments are rejected.
    Stdin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub when_to_execute: WhenToExecute,
    pub delay_ms: u64,
    pub python_path: Option<PathBuf>,
    pub tracer_module: String,
    pub tracer_args: String,
    pub source_delivery: SourceDelivery,
    pub install_args: String,
    pub show_source: bool,
    pub show_debug: bool,
    pub workspace_root: Option<PathBuf>,
    pub skip_landing_page: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            when_to_execute: WhenToExecute::AfterDelay,
            delay_ms: 300,
            python_path: None,
            tracer_module: "space_tracer".to_string(),
            tracer_args: format!("-m space_tracer {}", FILE_PLACEHOLDER),
            source_delivery: SourceDelivery::StdinAndFile,
            install_args: "-m pip install space_tracer".to_string(),
            show_source: true,
            show_debug: false,
            workspace_root: None,
            skip_landing_page: false,
        }
    }
}

/// `<config dir>/live-trace/settings.toml`, when the platform has a config dir.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

fn split_args(field: &'static str, value: &str) -> Result<Vec<String>, ConfigError> {
    shlex::split(value).ok_or_else(|| ConfigError::Arguments {
        field,
        value: value.to_string(),
    })
}

impl Settings {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &text)
    }

    /// An explicit path must exist. The default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }
        match default_settings_path() {
            Some(path) if path.is_file() => Self::load_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn display_flags(&self) -> DisplayFlags {
        DisplayFlags {
            show_source: self.show_source,
            show_debug: self.show_debug,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Scheduler options for an already resolved interpreter.
    pub fn run_options(&self, interpreter: PathBuf) -> Result<RunOptions, ConfigError> {
        let tracer_args = split_args("tracer_args", &self.tracer_args)?;
        if self.source_delivery == SourceDelivery::Stdin
            && tracer_args.iter().any(|a| a.contains(FILE_PLACEHOLDER))
        {
            return Err(ConfigError::Arguments {
                field: "tracer_args",
                value: self.tracer_args.clone(),
            });
        }

        Ok(RunOptions {
            interpreter,
            debounce: self.debounce(),
            tracer_module: self.tracer_module.clone(),
            tracer_args,
            install_args: split_args("install_args", &self.install_args)?,
            workspace_root: self.workspace_root.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml(Path::new("x.toml"), "").expect("parse");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "when_to_execute = \"on_save\"\ndelay_ms = 50").expect("write");

        let settings = Settings::load(Some(file.path())).expect("load");
        assert_eq!(settings.when_to_execute, WhenToExecute::OnSave);
        assert_eq!(settings.debounce(), Duration::from_millis(50));
        assert_eq!(settings.tracer_module, "space_tracer");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_toml_reports_path() {
        let err = Settings::from_toml(Path::new("broken.toml"), "delay_ms = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn arguments_are_shell_split() {
        let settings = Settings {
            tracer_args: "-m space_tracer --traced_file 'my file.py' {file}".to_string(),
            ..Settings::default()
        };
        let options = settings.run_options(PathBuf::from("python3")).expect("options");
        assert_eq!(
            options.tracer_args,
            vec!["-m", "space_tracer", "--traced_file", "my file.py", "{file}"]
        );
        assert_eq!(options.install_args, vec!["-m", "pip", "install", "space_tracer"]);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let settings = Settings {
            install_args: "-m pip install 'space_tracer".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.run_options(PathBuf::from("python3")),
            Err(ConfigError::Arguments { field: "install_args", .. })
        ));
    }

    #[test]
    fn stdin_delivery_refuses_file_placeholder() {
        let settings = Settings {
            source_delivery: SourceDelivery::Stdin,
            ..Settings::default()
        };
        assert!(settings.run_options(PathBuf::from("python3")).is_err());
    }
}
