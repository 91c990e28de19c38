//! Error types for `folia-core`.
//!
//! Two layers exist. [`ErrorKind`] is the stable, caller-visible outcome of an
//! operation handler: it never carries raw OS detail. [`CoreError`] covers the
//! infrastructure around the handlers (configuration, scanning, watching) and
//! is returned through [`CoreResult<T>`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Why an operation handler refused or failed a request.
///
/// Serialised as kebab-case strings (`"invalid-path"`, `"exists"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The caller is not authenticated. Checked before any validation.
    #[error("unauthorized")]
    Unauthorized,

    /// A user-entered name could not be normalised into a single segment.
    #[error("invalid-name")]
    InvalidName,

    /// A path failed normalisation, escapes the root, or violates containment.
    #[error("invalid-path")]
    InvalidPath,

    /// The destination already exists.
    #[error("exists")]
    Exists,

    /// A filesystem mutation failed after validation passed.
    #[error("write-failed")]
    WriteFailed,

    /// A filesystem read failed after validation passed.
    #[error("read-failed")]
    ReadFailed,

    /// A search query cannot be matched line by line (it contains a newline).
    #[error("invalid-query")]
    InvalidQuery,
}

impl ErrorKind {
    /// The wire string for this kind, identical to its `Display` output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidName => "invalid-name",
            ErrorKind::InvalidPath => "invalid-path",
            ErrorKind::Exists => "exists",
            ErrorKind::WriteFailed => "write-failed",
            ErrorKind::ReadFailed => "read-failed",
            ErrorKind::InvalidQuery => "invalid-query",
        }
    }
}

/// Infrastructure errors raised outside the operation-handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The target path does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The process lacks permission to access the path.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The configuration is syntactically valid but unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The filesystem watcher could not be created or attached.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A background scan task panicked or was cancelled.
    #[error("scan task failed: {0}")]
    ScanTask(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `folia-core`.
pub type CoreResult<T> = Result<T, CoreError>;
