//! Unified error handling for texbridge
//!
//! Fatal conversion failures (import, export, missing output) abort a job and
//! carry the engine status verbatim. Per-image problems never show up here;
//! they are collected as warnings by the pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::EngineStatus;

/// Fatal error kinds reported to the job caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ImportFailure,
    ExportFailure,
    OutputMissing,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ImportFailure => "ImportFailure",
            ErrorKind::ExportFailure => "ExportFailure",
            ErrorKind::OutputMissing => "OutputMissing",
        };
        f.write_str(name)
    }
}

/// Unified error type for all texbridge operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Conversion Errors ====================

    /// The engine could not import the input asset
    #[error("Import of {path} failed: {status}")]
    ImportFailed { path: PathBuf, status: EngineStatus },

    /// The engine could not export the scene
    #[error("Export to {path} failed: {status}")]
    ExportFailed { path: PathBuf, status: EngineStatus },

    /// The exporter reported success but wrote nothing
    #[error("Output file was not created at {0}")]
    OutputMissing(PathBuf),

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Fatal conversion kind, looking through context wrappers
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::ImportFailed { .. } => Some(ErrorKind::ImportFailure),
            Error::ExportFailed { .. } => Some(ErrorKind::ExportFailure),
            Error::OutputMissing(_) => Some(ErrorKind::OutputMissing),
            Error::WithContext { source, .. } => source.kind(),
            _ => None,
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileNotFound(_) | Error::OutputMissing(_) => true,
            Error::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            Error::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
