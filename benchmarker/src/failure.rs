//! Failure classification
//!
//! Every error surfaced by an action carries an [`ErrorKind`]. `Critical`
//! failures stop the current action and let the run abort early; every other
//! kind is recorded into the [`BenchmarkStep`](crate::step::BenchmarkStep)
//! and only withholds the score of that attempt.

use std::fmt;

use thiserror::Error;

/// Severity of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Request construction or transport failure; continuing is unsafe
    Critical,
    /// Transient timeout while fetching a sub-resource
    Timeout,
    InvalidStatusCode,
    InvalidContentType,
    InvalidJson,
    /// Sub-resource could not be fetched or its content does not match
    InvalidAsset,
}

impl ErrorKind {
    /// All kinds, in report order
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Critical,
        ErrorKind::Timeout,
        ErrorKind::InvalidStatusCode,
        ErrorKind::InvalidContentType,
        ErrorKind::InvalidJson,
        ErrorKind::InvalidAsset,
    ];

    /// Stable label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Critical => "critical",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidStatusCode => "invalid_status_code",
            ErrorKind::InvalidContentType => "invalid_content_type",
            ErrorKind::InvalidJson => "invalid_json",
            ErrorKind::InvalidAsset => "invalid_asset",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{kind}] {message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Critical, message)
    }

    pub fn is_critical(&self) -> bool {
        self.kind == ErrorKind::Critical
    }
}
