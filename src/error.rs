use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptError>;

#[derive(Debug, Error)]
pub enum CryptError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unrecognized container: {0}")]
    Format(String),

    /// Deliberately carries no detail: the cause is either tampering,
    /// corruption or a different master key, and none of them may be
    /// distinguished from the outside.
    #[error("Authentication failed: the file is corrupted, was tampered with, or was encrypted with a different key")]
    Integrity,

    #[error("Target file already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("{failed} of {total} files failed")]
    BatchFailed { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CryptError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}
