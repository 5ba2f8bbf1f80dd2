//! Custom error types for backee
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for backee operations
#[derive(Error, Debug, Clone)]
pub enum BackeeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A server type in the configuration that cannot be backed up to
    #[error("Unsupported server type: '{0}'")]
    UnsupportedServer(String),

    /// An item kind the engine cannot transfer yet
    #[error("Unsupported backup item: {0}")]
    UnsupportedItem(String),

    /// A local tool required for transfers is not installed
    #[error("{0} is not installed, but required")]
    MissingDependency(String),

    /// A remote file-system command exited with a non-zero status
    #[error("Cannot {operation} {path}: {detail}")]
    RemoteIo {
        operation: &'static str,
        path: String,
        detail: String,
    },

    /// A remote command wrote to standard error
    #[error("Remote command '{command}' wrote to stderr: '{stderr}'")]
    RemoteCommand { command: String, stderr: String },

    /// Not enough free space on the remote side for the estimated transfer
    #[error(
        "Insufficient space in {path}: need {required} bytes, have {available} bytes ({} bytes short)",
        .required.saturating_sub(*.available)
    )]
    InsufficientSpace {
        path: String,
        required: u64,
        available: u64,
    },

    /// The transfer sub-process failed
    #[error("Cannot transfer to {destination}: rsync exited with code {exit_code}: {stderr}")]
    Transfer {
        destination: String,
        exit_code: i32,
        stderr: String,
    },

    /// One or more (item, server) pairs did not complete
    #[error("{failed} of {total} backup(s) failed; first error: {first}")]
    BackupFailed {
        failed: usize,
        total: usize,
        first: Box<BackeeError>,
    },

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Log sink setup errors
    #[error("Logging error: {0}")]
    Logging(String),
}

impl BackeeError {
    /// Create a remote I/O error for a failed operation on a path
    pub fn remote_io(operation: &'static str, path: impl Into<String>) -> Self {
        Self::RemoteIo {
            operation,
            path: path.into(),
            detail: "non-zero exit status".to_string(),
        }
    }

    /// Bytes missing for an insufficient-space rejection
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            Self::InsufficientSpace {
                required,
                available,
                ..
            } => Some(required.saturating_sub(*available)),
            _ => None,
        }
    }

    /// Check if this error is a configuration-class mismatch rather than a
    /// failed backup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedServer(_) | Self::UnsupportedItem(_)
        )
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for BackeeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BackeeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for backee operations
pub type BackeeResult<T> = Result<T, BackeeError>;
