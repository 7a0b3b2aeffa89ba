//! Error types for arxivflat.
//!
//! Library crates use [`ArxivFlatError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all arxivflat operations.
#[derive(Debug, thiserror::Error)]
pub enum ArxivFlatError {
    /// The input does not contain a recognizable arXiv identifier.
    #[error("invalid reference '{input}': no arXiv identifier found")]
    InvalidReference { input: String },

    /// The remote confirmed that no submission or no source exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient connectivity or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// Corrupt, unsupported, or unsafe archive payload.
    #[error("archive error: {0}")]
    Archive(String),

    /// No `.tex` file in the bundle qualifies as the document root.
    #[error("no entry file: {0}")]
    NoEntryFound(String),

    /// Local cache read or write failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArxivFlatError>;

/// Failure classification surfaced to callers of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidReference,
    NotFound,
    NetworkError,
    ArchiveError,
    NoEntryFound,
    CacheError,
}

impl ErrorKind {
    /// Stable name used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidReference => "InvalidReference",
            Self::NotFound => "NotFound",
            Self::NetworkError => "NetworkError",
            Self::ArchiveError => "ArchiveError",
            Self::NoEntryFound => "NoEntryFound",
            Self::CacheError => "CacheError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ArxivFlatError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-reference error for the given raw input.
    pub fn invalid_reference(input: impl Into<String>) -> Self {
        Self::InvalidReference {
            input: input.into(),
        }
    }

    /// Create an archive error from any displayable message.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a cache error from any displayable message.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error into the caller-facing taxonomy.
    ///
    /// Bare I/O and config errors only escape from local storage paths, so
    /// they classify as [`ErrorKind::CacheError`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Archive(_) => ErrorKind::ArchiveError,
            Self::NoEntryFound(_) => ErrorKind::NoEntryFound,
            Self::Cache(_) | Self::Config { .. } | Self::Io { .. } => ErrorKind::CacheError,
        }
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
