//! Error types for the preference file store.
//!
//! All errors are propagated via [`StoreError`], which records the file
//! involved alongside the underlying I/O or YAML failure.

use std::path::PathBuf;

use contrail_core::preferences::PreferenceError;

/// Errors that can occur while loading or saving `players.yml`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file contents could not be encoded or decoded.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for PreferenceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { path, source } => Self::Io { path, source },
            StoreError::Yaml(source) => Self::Yaml { source },
        }
    }
}
