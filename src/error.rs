use std::io;
use std::path::PathBuf;

/// A child process could not be started.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("could not spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("could not write source copy to {}: {source}", path.display())]
    SourceCopy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// The program itself was not found (missing binary, bad path).
    pub fn is_not_found(&self) -> bool {
        match self {
            LaunchError::Spawn { source, .. } => source.kind() == io::ErrorKind::NotFound,
            LaunchError::SourceCopy { .. } => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("an installation is already running for {}", .0.display())]
    AlreadyInProgress(PathBuf),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("setting `{field}` is not a valid argument list: {value}")]
    Arguments { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message header without Content-Length")]
    MissingContentLength,
}
