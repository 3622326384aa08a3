//! Error taxonomy for the duplex protocol.
//!
//! Failures are data: a `ToolError` renders as the same JSON envelope shape
//! as a success (only `status` differs), so agent callers always parse the
//! primary channel instead of scraping stderr.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::Response;

/// Error kinds, partitioned by default recoverability.
///
/// Recoverable means the caller can plausibly fix the input and retry;
/// the default can be overridden per occurrence on [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Recoverable by default
    InvalidInput,
    MissingParam,
    InvalidPath,
    NotFound,
    Conflict,
    Precondition,

    // Not recoverable by default
    Timeout,
    Permission,
    Internal,
    Dependency,
}

impl ErrorCode {
    /// Default recoverability for this kind.
    pub fn default_recoverable(self) -> bool {
        matches!(
            self,
            Self::InvalidInput
                | Self::MissingParam
                | Self::InvalidPath
                | Self::NotFound
                | Self::Conflict
                | Self::Precondition
        )
    }

    /// Wire name of this kind (e.g. `INVALID_INPUT`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingParam => "MISSING_PARAM",
            Self::InvalidPath => "INVALID_PATH",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Precondition => "PRECONDITION",
            Self::Timeout => "TIMEOUT",
            Self::Permission => "PERMISSION",
            Self::Internal => "INTERNAL",
            Self::Dependency => "DEPENDENCY",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured tool failure.
///
/// `recoverable` defaults from the kind's static table unless overridden
/// with [`ToolError::with_recoverable`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    pub suggestion: Option<String>,
    pub context: Option<Value>,
}

impl ToolError {
    /// Create an error with the kind's default recoverability.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: code.default_recoverable(),
            suggestion: None,
            context: None,
        }
    }

    /// Shorthand for an `INVALID_INPUT` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Shorthand for a `NOT_FOUND` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for an `INTERNAL` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Override the recoverability default.
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Attach a suggested remedy for the caller.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach structured context.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Wrap into a response envelope.
    pub fn to_response(&self) -> Response {
        Response::from_error(self)
    }
}
