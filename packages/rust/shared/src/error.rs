//! Error types for the must-gather tooling.
//!
//! Library crates use [`MustGatherError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for workspace ingestion and resolution.
#[derive(Debug, thiserror::Error)]
pub enum MustGatherError {
    /// The supplied path does not exist or cannot be read.
    #[error("input not found: {path:?}")]
    InputNotFound { path: PathBuf },

    /// The input is neither a directory nor a recognized archive.
    #[error("unsupported format: {path:?} is not a directory, tar, tar.gz or zip archive")]
    UnsupportedFormat { path: PathBuf },

    /// An archive entry failed mid-extraction.
    #[error("corrupt archive {archive:?} at entry '{entry}': {message}")]
    CorruptArchive {
        archive: PathBuf,
        entry: String,
        message: String,
    },

    /// A timestamped directory does not hold exactly one subdirectory.
    #[error(
        "ambiguous layout at {dir:?}: expected exactly one subdirectory under a timestamped directory, found {found}"
    )]
    AmbiguousLayout { dir: PathBuf, found: usize },

    /// No `namespaces` directory reachable through a unique chain of subdirectories.
    #[error(
        "unrecognized layout at {dir:?}: no 'namespaces' directory and {found} subdirectories to descend into"
    )]
    UnrecognizedLayout { dir: PathBuf, found: usize },

    /// The requested namespace does not exist under the workspace root.
    #[error("unknown namespace '{namespace}' in {root:?}")]
    UnknownNamespace { namespace: String, root: PathBuf },

    /// A command needs a selected workspace but none is current.
    #[error("no active workspace: run `use <path-or-archive>` first")]
    NoActiveWorkspace,

    /// No stored context matches the given id or path.
    #[error("no context matches '{key}'")]
    ContextNotFound { key: String },

    /// The context file could not be read or parsed.
    #[error("context store {path:?} is corrupt: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    /// Configuration resolution error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// User-supplied value rejected.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MustGatherError>;

impl MustGatherError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Build a [`MustGatherError::CorruptArchive`] for a failing entry.
    pub fn corrupt_archive(
        archive: impl Into<PathBuf>,
        entry: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::CorruptArchive {
            archive: archive.into(),
            entry: entry.into(),
            message: message.to_string(),
        }
    }
}
