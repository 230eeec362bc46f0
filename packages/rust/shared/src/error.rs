//! Error types for c2md.
//!
//! Library crates use [`C2mdError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all c2md operations.
#[derive(Debug, thiserror::Error)]
pub enum C2mdError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A record in the export is missing a required field or has fields
    /// out of order. `line` is the 1-based line where the record starts.
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// A locator component sanitized down to nothing and was replaced.
    /// Never fatal; kept for diagnostics.
    #[error("locator component {component:?} is unusable, using {fallback:?}")]
    LocatorSanitization { component: String, fallback: String },

    /// Writing one output file failed (permissions, disk full, path length).
    #[error("failed to write {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Filesystem I/O error outside of per-file writes.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input path, invalid option values, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON or TOML serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, C2mdError>;

impl C2mdError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-record error for the record starting at `line`.
    pub fn malformed(line: usize, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
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

    /// Wrap a failed per-file write.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Whether this error marks a record as failed. Sanitization fallbacks
    /// are informational and do not.
    pub fn is_record_failure(&self) -> bool {
        !matches!(self, Self::LocatorSanitization { .. })
    }
}
