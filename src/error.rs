//! Error types for the `subgen` crate.
//!
//! This module defines [`SubgenError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid debugging,
//! including file paths, tool names, exit statuses, and captured stderr.

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

/// The unified error type for all `subgen` operations.
///
/// Every public method that can fail returns `Result<T, SubgenError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubgenError {
    /// The root directory to process does not exist.
    #[error("Directory '{0}' does not exist")]
    RootNotFound(PathBuf),

    /// The root path exists but is not a directory.
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// The speech-recognition model file could not be found.
    #[error("Model file not found at {0}")]
    ModelNotFound(PathBuf),

    /// An external executable could not be located on `PATH`.
    #[error("Executable '{0}' was not found on PATH")]
    ToolNotFound(String),

    /// An external executable could not be started.
    #[error("Failed to run {tool}: {source}")]
    ToolSpawn {
        /// Name or path of the executable.
        tool: String,
        /// Underlying I/O error from process creation.
        #[source]
        source: IoError,
    },

    /// An external executable exited unsuccessfully.
    #[error("{tool} exited with {status}{}", format_stderr(.stderr))]
    ToolFailed {
        /// Name or path of the executable.
        tool: String,
        /// Human-readable exit status (`exit status: 1`, `signal: 2`, ...).
        status: String,
        /// Tail of the captured standard error output, if any.
        stderr: String,
    },

    /// An external executable succeeded but did not produce its artifact.
    #[error("Expected {tool} to generate {expected}, but it was not found")]
    MissingOutput {
        /// Name or path of the executable.
        tool: String,
        /// Where the artifact should have been written.
        expected: PathBuf,
    },

    /// The resume checkpoint record could not be encoded or decoded.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// The media library could not be scanned.
    #[error("Scan error: {0}")]
    Scan(String),

    /// A configuration value was rejected.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for SubgenError {
    fn from(error: serde_json::Error) -> Self {
        SubgenError::Checkpoint(error.to_string())
    }
}

impl From<walkdir::Error> for SubgenError {
    fn from(error: walkdir::Error) -> Self {
        SubgenError::Scan(error.to_string())
    }
}

fn format_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
