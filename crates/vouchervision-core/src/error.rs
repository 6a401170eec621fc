//! Error types for the VoucherVision client.
//!
//! Errors are split by blast radius. `VoucherError` covers batch-fatal
//! problems that are raised before any request leaves the machine.
//! `ItemError` covers everything that can go wrong for a single image; those
//! never propagate out of the worker pool and are folded into
//! [`Outcome::Failure`](crate::report::Outcome) instead. `OutputError` covers
//! persistence of an already-complete report.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for VoucherVision operations.
#[derive(Error, Debug)]
pub enum VoucherError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or contradictory source specification
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No credential was supplied for the batch
    #[error(
        "No credential supplied. Pass --auth-token, set VV_API_KEY, or set auth.credential in the config file"
    )]
    MissingCredential,

    /// Report persistence errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-image failures. Each one ends up as a failed row in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// The local image could not be opened or read
    #[error("Failed to read image {path}: {message}")]
    FileUnreadable { path: PathBuf, message: String },

    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("Request failed: {0}")]
    Network(String),

    /// The request did not complete within the per-item timeout
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The server answered 200 but the body was not valid JSON
    #[error("Malformed response (HTTP {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Remote { status: u16, message: String },
}

impl ItemError {
    /// Classify a transport-level reqwest error.
    pub fn from_transport(error: &reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            ItemError::Timeout { timeout_ms }
        } else {
            ItemError::Network(error.to_string())
        }
    }

    /// HTTP status associated with this failure, if the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ItemError::MalformedResponse { status, .. } | ItemError::Remote { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Errors writing a finished report to disk.
#[derive(Error, Debug)]
pub enum OutputError {
    /// The destination could not be created or written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for VoucherVision results.
pub type Result<T> = std::result::Result<T, VoucherError>;

/// Convenience type alias for per-item results.
pub type ItemResult<T> = std::result::Result<T, ItemError>;
