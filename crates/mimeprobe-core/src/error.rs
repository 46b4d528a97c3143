//! Error types for detection and configuration

use std::path::PathBuf;
use thiserror::Error;

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors raised by the detection engine.
///
/// Only [`ProbeError::Unreachable`] ever escapes a detection call. Every
/// other variant raised while a signature is being tried is converted into
/// "this signature did not match" by the registry.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Truncated input: needed {requested} bytes at offset {offset}, only {available} available")]
    TruncatedInput {
        offset: u64,
        requested: usize,
        available: usize,
    },

    #[error("Malformed {format} content: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    #[error("Failed to open resource: {locator}")]
    Unreachable {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while sniffing: {0}")]
    Io(#[from] std::io::Error),

    #[error("A decoding override is already installed on {locator}")]
    OverrideActive { locator: String },

    #[error("Invalid MIME type: '{value}'")]
    InvalidMimeType { value: String },

    #[error("Invalid signature '{id}': {message}")]
    InvalidSignature { id: String, message: String },

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Too many files to scan: {count} files found, limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },

    /// Failure raised by an application-defined signature.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    pub(crate) fn malformed(format: &'static str, message: impl ToString) -> Self {
        ProbeError::Malformed {
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_signature(id: &str, message: impl ToString) -> Self {
        ProbeError::InvalidSignature {
            id: id.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for errors that a detection call reports to its caller
    /// instead of treating as a failed match.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Unreachable { .. })
    }
}
