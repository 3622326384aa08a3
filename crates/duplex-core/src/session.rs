//! Session driver: bidirectional alternating exchange.
//!
//! The tool body runs as a spawned task holding a [`SessionPeer`]; the
//! driver emits the first event, then alternates between reading one JSON
//! line from the input channel and emitting the tool's next event. A closed
//! or blank input line synthesizes `{"action": "quit"}` so a disconnected
//! caller ends the session instead of hanging it. A malformed input line is
//! fatal to the whole session.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use duplex_types::{Response, SessionEvent, Status, ToolError, ToolParams};

use crate::context::ToolContext;
use crate::task::{join_error, AbortOnDrop};
use crate::traits::Tool;

/// The tool body's end of a session: emit events, receive caller input.
pub struct SessionPeer {
    events: mpsc::Sender<SessionEvent>,
    inputs: mpsc::Receiver<Value>,
}

impl SessionPeer {
    /// Emit one event to the caller.
    pub async fn emit(&self, event: SessionEvent) -> Result<(), ToolError> {
        self.events
            .send(event)
            .await
            .map_err(|_| ToolError::internal("session driver closed"))
    }

    /// Wait for the caller's next input value.
    pub async fn recv(&mut self) -> Result<Value, ToolError> {
        self.inputs
            .recv()
            .await
            .ok_or_else(|| ToolError::internal("session input closed"))
    }

    /// Yield point: emit an event and block for the caller's reply.
    pub async fn exchange(&mut self, event: SessionEvent) -> Result<Value, ToolError> {
        self.emit(event).await?;
        self.recv().await
    }
}

fn success_status() -> Response {
    Response {
        status: Status::Success,
        result: None,
        error: None,
        summary: None,
        errors: None,
    }
}

fn error_status(err: &ToolError) -> Response {
    Response::from_error(&ToolError::internal(err.message.clone()))
}

/// Run a session tool to completion, returning the terminal status object.
///
/// Any normal completion (explicit `session_end` or tool return) yields
/// `{status: success}`; a tool failure, panic, or input parse error yields
/// an `INTERNAL` error status.
pub async fn run_session(
    tool: Arc<dyn Tool>,
    params: ToolParams,
    ctx: &ToolContext,
) -> Result<Response, ToolError> {
    let (ev_tx, mut ev_rx) = mpsc::channel(1);
    let (in_tx, in_rx) = mpsc::channel(1);
    let mut task = AbortOnDrop({
        let tool = Arc::clone(&tool);
        let ctx = ctx.clone();
        let peer = SessionPeer {
            events: ev_tx,
            inputs: in_rx,
        };
        tokio::spawn(async move { tool.converse(params, peer, &ctx).await })
    });

    let write = |event: &SessionEvent| {
        ctx.out()
            .write_json(event)
            .map_err(|e| ToolError::internal(format!("primary channel write failed: {e}")))
    };

    // First event, emitted before any input is read.
    match ev_rx.recv().await {
        Some(event) => write(&event)?,
        None => return Ok(finish(&mut task).await),
    }

    loop {
        let input = match ctx
            .input()
            .read_line()
            .await
            .map_err(|e| ToolError::internal(format!("input channel read failed: {e}")))?
        {
            None => json!({"action": "quit"}),
            Some(line) if line.trim().is_empty() => json!({"action": "quit"}),
            Some(line) => match serde_json::from_str(line.trim()) {
                Ok(value) => value,
                Err(e) => {
                    return Ok(error_status(&ToolError::internal(format!(
                        "Invalid session input: {e}"
                    ))));
                }
            },
        };

        if in_tx.send(input).await.is_err() {
            // Tool finished between events: natural exhaustion.
            break;
        }

        match ev_rx.recv().await {
            None => break,
            Some(event) => {
                write(&event)?;
                if event.is_end() {
                    // Explicit end is success regardless of how the tool
                    // body winds down afterwards.
                    return Ok(success_status());
                }
            }
        }
    }

    Ok(finish(&mut task).await)
}

async fn finish(task: &mut AbortOnDrop<Result<(), ToolError>>) -> Response {
    match (&mut task.0).await {
        Ok(Ok(())) => success_status(),
        Ok(Err(err)) => error_status(&err),
        Err(err) => error_status(&join_error(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InputChannel, OutputChannel};
    use async_trait::async_trait;
    use duplex_types::{ToolMeta, ToolSchema};

    /// Echo session: starts, echoes each input, quits on `action: quit`.
    struct EchoSession;

    #[async_trait]
    impl Tool for EchoSession {
        fn name(&self) -> &str {
            "echo_session"
        }

        fn meta(&self) -> ToolMeta {
            ToolMeta::new("Echo conversation")
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new("echo_session", "Echo conversation")
        }

        fn mode(&self) -> crate::traits::ExecMode {
            crate::traits::ExecMode::Session
        }

        async fn converse(
            &self,
            _params: ToolParams,
            mut peer: SessionPeer,
            _ctx: &ToolContext,
        ) -> Result<(), ToolError> {
            let mut input = peer.exchange(SessionEvent::start("Echo ready")).await?;
            loop {
                if input.get("action").and_then(Value::as_str) == Some("quit") {
                    peer.emit(SessionEvent::end("success")).await?;
                    return Ok(());
                }
                let text = input
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                input = peer
                    .exchange(SessionEvent::other(json!({"type": "echo", "text": text})))
                    .await?;
            }
        }
    }

    fn ctx(script: &str) -> (ToolContext, crate::context::BufferHandle) {
        let (out, handle) = OutputChannel::buffer();
        let (errs, _) = OutputChannel::buffer();
        (
            ToolContext::new(out, errs, InputChannel::scripted(script)),
            handle,
        )
    }

    #[tokio::test]
    async fn explicit_end_is_success() {
        let (ctx, out) = ctx("{\"text\": \"hi\"}\n{\"action\": \"quit\"}\n");
        let status = run_session(Arc::new(EchoSession), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Success);

        let lines = out.lines();
        // start, echo, session_end
        assert_eq!(lines.len(), 3);
        let first: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["type"], "session_start");
        let second: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second["text"], "hi");
        let last: Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(last["type"], "session_end");
    }

    #[tokio::test]
    async fn eof_synthesizes_quit() {
        let (ctx, out) = ctx("");
        let status = run_session(Arc::new(EchoSession), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Success);
        let last: Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
        assert_eq!(last["type"], "session_end");
    }

    #[tokio::test]
    async fn blank_line_synthesizes_quit() {
        let (ctx, _out) = ctx("\n");
        let status = run_session(Arc::new(EchoSession), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Success);
    }

    #[tokio::test]
    async fn malformed_input_ends_the_session_with_an_error() {
        let (ctx, _out) = ctx("not json at all\n");
        let status = run_session(Arc::new(EchoSession), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Error);
        let error = status.error.unwrap();
        assert_eq!(error.code, duplex_types::ErrorCode::Internal);
        assert!(!error.recoverable);
    }

    #[tokio::test]
    async fn tool_failure_yields_internal_error_status() {
        struct Failing;

        #[async_trait]
        impl Tool for Failing {
            fn name(&self) -> &str {
                "failing"
            }
            fn meta(&self) -> ToolMeta {
                ToolMeta::default()
            }
            fn schema(&self) -> ToolSchema {
                ToolSchema::new("failing", "")
            }
            async fn converse(
                &self,
                _params: ToolParams,
                mut peer: SessionPeer,
                _ctx: &ToolContext,
            ) -> Result<(), ToolError> {
                peer.exchange(SessionEvent::start("about to fail")).await?;
                Err(ToolError::invalid_input("cannot continue"))
            }
        }

        let (ctx, _out) = ctx("{\"text\": \"hello\"}\n");
        let status = run_session(Arc::new(Failing), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Error);
        let error = status.error.unwrap();
        // Session failures are coerced to INTERNAL, keeping the message.
        assert_eq!(error.code, duplex_types::ErrorCode::Internal);
        assert_eq!(error.message, "cannot continue");
    }

    #[tokio::test]
    async fn natural_exhaustion_is_success() {
        struct OneShot;

        #[async_trait]
        impl Tool for OneShot {
            fn name(&self) -> &str {
                "oneshot"
            }
            fn meta(&self) -> ToolMeta {
                ToolMeta::default()
            }
            fn schema(&self) -> ToolSchema {
                ToolSchema::new("oneshot", "")
            }
            async fn converse(
                &self,
                _params: ToolParams,
                mut peer: SessionPeer,
                _ctx: &ToolContext,
            ) -> Result<(), ToolError> {
                // Yields once, consumes one input, then returns without an
                // explicit session_end.
                peer.exchange(SessionEvent::start("one exchange only")).await?;
                Ok(())
            }
        }

        let (ctx, _out) = ctx("{\"text\": \"hello\"}\n");
        let status = run_session(Arc::new(OneShot), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert_eq!(status.status, Status::Success);
    }
}
