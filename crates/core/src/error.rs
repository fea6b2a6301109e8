use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of everything that can go wrong during an analysis.
///
/// The kind decides retry behaviour and the text shown to the user; the accompanying
/// message on [`AnalysisError`] carries the technical detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The caller supplied an empty or malformed request, or the capability rejected it.
    InvalidRequest,
    /// The capability reports the usage allowance is exhausted.
    QuotaExceeded,
    /// Network or capability-side failure.
    Unreachable,
    /// The capability did not answer within the per-call timeout.
    Timeout,
    /// The capability answered, but not with a usable JSON document.
    MalformedOutput,
    /// The caller withdrew the request.
    Cancelled,
    /// The vitals store could not be read.
    Storage,
}

impl ErrorKind {
    /// Only transient capability faults may be retried, and only once.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Unreachable | ErrorKind::Timeout)
    }

    /// Stable snake_case name, as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedOutput => "malformed_output",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Storage => "storage",
        }
    }

    /// Actionable text for the presentation layer.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => {
                "The request could not be analysed. Please check the input and try again."
            }
            ErrorKind::QuotaExceeded => {
                "The analysis service usage limit has been reached. Please contact support about your plan."
            }
            ErrorKind::Unreachable => {
                "The analysis service is currently unavailable. Please retry in a few minutes."
            }
            ErrorKind::Timeout => {
                "The analysis service took too long to respond. Please retry."
            }
            ErrorKind::MalformedOutput => {
                "The analysis service returned a response that could not be read. Please retry or review the input manually."
            }
            ErrorKind::Cancelled => "The analysis was cancelled.",
            ErrorKind::Storage => {
                "Recorded vitals could not be loaded. Please retry or contact support."
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of an analysis step, carrying the kind of the step that failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AnalysisError {
    kind: ErrorKind,
    message: String,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedOutput, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled by caller")
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Technical detail, suitable for logs.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text to show the user. Quota failures are surfaced verbatim.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::QuotaExceeded if !self.message.trim().is_empty() => {
                format!("{} ({})", self.kind.user_message(), self.message.trim())
            }
            kind => kind.user_message().to_string(),
        }
    }
}

impl From<medassist_uuid::UuidError> for AnalysisError {
    fn from(err: medassist_uuid::UuidError) -> Self {
        AnalysisError::invalid_request(err.to_string())
    }
}

impl From<medassist_types::TextError> for AnalysisError {
    fn from(err: medassist_types::TextError) -> Self {
        AnalysisError::invalid_request(err.to_string())
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
