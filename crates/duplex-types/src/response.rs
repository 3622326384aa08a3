//! Response envelope — the outer shape of every direct-mode result.
//!
//! Exactly one of three statuses: `success`, `error`, or `partial`. A
//! partial response derives its status from the succeeded/failed counts so
//! the invariant `status == error iff succeeded == 0 && failed > 0` holds by
//! construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, ToolError};

/// Envelope discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Partial,
}

/// The `error` object inside an error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl From<&ToolError> for ErrorBody {
    fn from(err: &ToolError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            recoverable: err.recoverable,
            suggestion: err.suggestion.clone(),
            context: err.context.clone(),
        }
    }
}

/// Batch outcome counts carried by partial responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub recoverable_failures: usize,
}

/// The response envelope.
///
/// Built through [`Response::success`], [`Response::error`], or
/// [`Response::partial`]; the optional fields are populated per shape and
/// omitted from the wire when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorBody>>,
}

impl Response {
    /// Success envelope around a result value.
    pub fn success(result: Value) -> Self {
        Self {
            status: Status::Success,
            result: Some(result),
            error: None,
            summary: None,
            errors: None,
        }
    }

    /// Error envelope from a structured error.
    pub fn from_error(err: &ToolError) -> Self {
        Self {
            status: Status::Error,
            result: None,
            error: Some(ErrorBody::from(err)),
            summary: None,
            errors: None,
        }
    }

    /// Error envelope from parts, with the kind's default recoverability.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::from_error(&ToolError::new(code, message))
    }

    /// Partial envelope for batch operations.
    ///
    /// The succeeded count is the length of the array under `result_key`, or
    /// of the first array value in `result` when no key is given. Status
    /// derives from the counts: all failed is `error`, none failed is
    /// `success`, anything else is `partial`.
    pub fn partial(result: Value, errors: Vec<ErrorBody>, result_key: Option<&str>) -> Self {
        let succeeded = match (&result, result_key) {
            (Value::Object(map), Some(key)) => {
                map.get(key).and_then(Value::as_array).map_or(0, Vec::len)
            }
            (Value::Object(map), None) => map
                .values()
                .find_map(Value::as_array)
                .map_or(0, Vec::len),
            _ => 0,
        };
        let failed = errors.len();
        let recoverable_failures = errors.iter().filter(|e| e.recoverable).count();

        let status = if failed == 0 {
            Status::Success
        } else if succeeded == 0 {
            Status::Error
        } else {
            Status::Partial
        };

        Self {
            status,
            result: Some(result),
            error: None,
            summary: Some(Summary {
                total: succeeded + failed,
                succeeded,
                failed,
                recoverable_failures,
            }),
            errors: if errors.is_empty() { None } else { Some(errors) },
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
