//! Error types for logrotor

use std::path::{Path, PathBuf};

/// logrotor error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Log file missing: {0}")]
    MissingFile(PathBuf),

    #[error("Cannot {op} {path}: {source}")]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file changed during rotation: {0}")]
    FileChanged(PathBuf),

    #[error("{stage} hook failed for group {group}: {message}")]
    HookFailed {
        stage: String,
        group: String,
        message: String,
    },

    #[error("Compression of {path} failed: {message}")]
    CompressionFailed { path: PathBuf, message: String },

    #[error("Group {group} aborted: {reason}")]
    GroupAborted { group: String, reason: String },

    #[error("State file error: {0}")]
    StatePersist(String),

    #[error("Command failed to start: {0}")]
    CommandStartFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for logrotor
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn state<S: Into<String>>(msg: S) -> Self {
        Error::StatePersist(msg.into())
    }

    /// Build a mapper that tags an io error with the operation and path
    pub fn fs<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| Error::Filesystem {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn hook<S: Into<String>>(stage: &str, group: &str, msg: S) -> Self {
        Error::HookFailed {
            stage: stage.to_string(),
            group: group.to_string(),
            message: msg.into(),
        }
    }
}
