//! Error types for zoteroimport.
//!
//! Library crates use [`ImportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all import operations.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A blocking call to the remote library failed (page, tags, children, file).
    #[error("remote fetch error: {0}")]
    RemoteFetch(String),

    /// Feed or content markup could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The destination repository refused a translated item.
    #[error("sink submission error: {0}")]
    SinkSubmission(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad mapping table, unknown library type, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The run was stopped through its cancellation flag.
    #[error("import cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ImportError>;

impl ImportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
