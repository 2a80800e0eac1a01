use std::path::Path;

use thiserror::Error;

/// Errors of the log readers, file writers and pipeline.
///
/// `Format` and `Consistency` abort a run before any clustering work starts.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed token stream, missing or mismatched marker.
    #[error("{source_name}:{line}: {detail}")]
    Format {
        source_name: String,
        line: usize,
        detail: String,
    },

    /// Event counts or references that do not agree within or across files.
    #[error("{source_name}: {detail}")]
    Consistency { source_name: String, detail: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] dfcore::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io { path: path.display().to_string(), source }
    }

    pub fn format(source_name: &str, line: usize, detail: impl Into<String>) -> Self {
        Error::Format { source_name: source_name.to_string(), line, detail: detail.into() }
    }

    pub fn consistency(source_name: &str, detail: impl Into<String>) -> Self {
        Error::Consistency { source_name: source_name.to_string(), detail: detail.into() }
    }
}
