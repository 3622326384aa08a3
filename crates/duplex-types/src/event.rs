//! Wire events for the streaming and session execution modes.
//!
//! Every event is one line of JSON on the primary channel, discriminated by
//! a `type` field. Streaming events flow one way (tool to caller); session
//! events alternate with caller input lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::Response;

/// One-way streaming event.
///
/// The `result` variant carries a full response envelope flattened beside
/// the `type` tag; the streaming driver returns the last one seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },
    Log {
        level: String,
        message: String,
    },
    Artifact {
        name: String,
        uri: String,
    },
    Result {
        #[serde(flatten)]
        response: Response,
    },
}

impl StreamEvent {
    /// Progress event with an optional completion percentage.
    pub fn progress(message: impl Into<String>, percent: Option<u8>) -> Self {
        Self::Progress {
            message: message.into(),
            percent,
        }
    }

    /// Log event at the given level.
    pub fn log(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Log {
            level: level.into(),
            message: message.into(),
        }
    }

    /// Artifact event pointing at a produced resource.
    pub fn artifact(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::Artifact {
            name: name.into(),
            uri: uri.into(),
        }
    }

    /// Terminal result event wrapping a response envelope.
    pub fn result(response: Response) -> Self {
        Self::Result { response }
    }

    /// True for the terminal `result` event.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}

/// Bidirectional session event.
///
/// Tools may emit their own shapes through the opaque variant; the driver
/// only ever inspects the `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart {
        message: String,
        prompt: String,
    },
    AwaitingInput {
        prompt: String,
    },
    SessionEnd {
        status: String,
    },
    #[serde(untagged)]
    Other(Value),
}

impl SessionEvent {
    /// Session-start event with the default `"> "` prompt.
    pub fn start(message: impl Into<String>) -> Self {
        Self::SessionStart {
            message: message.into(),
            prompt: "> ".into(),
        }
    }

    /// Awaiting-input event with the default `"> "` prompt.
    pub fn awaiting() -> Self {
        Self::AwaitingInput { prompt: "> ".into() }
    }

    /// Session-end event.
    pub fn end(status: impl Into<String>) -> Self {
        Self::SessionEnd {
            status: status.into(),
        }
    }

    /// Arbitrary tool-defined event.
    pub fn other(value: Value) -> Self {
        Self::Other(value)
    }

    /// True when this event terminates the session.
    pub fn is_end(&self) -> bool {
        match self {
            Self::SessionEnd { .. } => true,
            Self::Other(value) => value.get("type").and_then(Value::as_str) == Some("session_end"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_omits_missing_percent() {
        let v = serde_json::to_value(StreamEvent::progress("working", None)).unwrap();
        assert_eq!(v, json!({"type": "progress", "message": "working"}));

        let v = serde_json::to_value(StreamEvent::progress("working", Some(40))).unwrap();
        assert_eq!(v, json!({"type": "progress", "message": "working", "percent": 40}));
    }

    #[test]
    fn result_flattens_the_envelope() {
        let v = serde_json::to_value(StreamEvent::result(Response::success(json!({"n": 3})))).unwrap();
        assert_eq!(
            v,
            json!({"type": "result", "status": "success", "result": {"n": 3}})
        );
    }

    #[test]
    fn log_and_artifact_shapes() {
        let v = serde_json::to_value(StreamEvent::log("info", "hello")).unwrap();
        assert_eq!(v, json!({"type": "log", "level": "info", "message": "hello"}));

        let v = serde_json::to_value(StreamEvent::artifact("out.json", "/tmp/out.json")).unwrap();
        assert_eq!(v, json!({"type": "artifact", "name": "out.json", "uri": "/tmp/out.json"}));
    }

    #[test]
    fn session_event_shapes() {
        let v = serde_json::to_value(SessionEvent::start("Chat started")).unwrap();
        assert_eq!(
            v,
            json!({"type": "session_start", "message": "Chat started", "prompt": "> "})
        );

        let v = serde_json::to_value(SessionEvent::awaiting()).unwrap();
        assert_eq!(v, json!({"type": "awaiting_input", "prompt": "> "}));

        let v = serde_json::to_value(SessionEvent::end("success")).unwrap();
        assert_eq!(v, json!({"type": "session_end", "status": "success"}));
    }

    #[test]
    fn end_detection_covers_opaque_events() {
        assert!(SessionEvent::end("success").is_end());
        assert!(!SessionEvent::awaiting().is_end());
        assert!(SessionEvent::other(json!({"type": "session_end"})).is_end());
        assert!(!SessionEvent::other(json!({"type": "echo", "text": "hi"})).is_end());
    }
}
