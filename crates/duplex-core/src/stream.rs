//! Streaming driver: one-way event emission.
//!
//! The tool body runs as a spawned task pushing events into a bounded
//! channel; the driver drains the channel, printing each event as one
//! flushed JSON line on the primary channel. The driver owns all primary
//! output for the invocation and performs no error translation — a tool
//! failure propagates to the dispatcher's outer catch-all.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use duplex_types::{Response, StreamEvent, ToolError, ToolParams};

use crate::context::ToolContext;
use crate::task::{join_error, AbortOnDrop};
use crate::traits::Tool;

/// Sending half handed to a streaming tool body.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// Emit one event. Fails if the driver has gone away.
    pub async fn send(&self, event: StreamEvent) -> Result<(), ToolError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ToolError::internal("event stream closed"))
    }

    /// Emit a progress event.
    pub async fn progress(
        &self,
        message: impl Into<String>,
        percent: Option<u8>,
    ) -> Result<(), ToolError> {
        self.send(StreamEvent::progress(message, percent)).await
    }

    /// Emit a log event.
    pub async fn log(
        &self,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ToolError> {
        self.send(StreamEvent::log(level, message)).await
    }

    /// Emit an artifact event.
    pub async fn artifact(
        &self,
        name: impl Into<String>,
        uri: impl Into<String>,
    ) -> Result<(), ToolError> {
        self.send(StreamEvent::artifact(name, uri)).await
    }

    /// Emit a terminal result event wrapping a response envelope.
    pub async fn result(&self, response: Response) -> Result<(), ToolError> {
        self.send(StreamEvent::result(response)).await
    }

    /// Emit a tool-defined success result.
    pub async fn success(&self, result: Value) -> Result<(), ToolError> {
        self.result(Response::success(result)).await
    }
}

/// Drain a streaming tool, emitting every event and returning the last
/// `result` event seen (or `None` if the stream ended without one).
pub async fn run_streaming(
    tool: Arc<dyn Tool>,
    params: ToolParams,
    ctx: &ToolContext,
) -> Result<Option<StreamEvent>, ToolError> {
    // Capacity 1: the producer and driver alternate, never running ahead.
    let (tx, mut rx) = mpsc::channel(1);
    let mut producer = AbortOnDrop({
        let tool = Arc::clone(&tool);
        let ctx = ctx.clone();
        let sink = EventSink::new(tx);
        tokio::spawn(async move { tool.produce(params, sink, &ctx).await })
    });

    let mut last_result = None;
    while let Some(event) = rx.recv().await {
        ctx.out()
            .write_json(&event)
            .map_err(|e| ToolError::internal(format!("primary channel write failed: {e}")))?;
        if event.is_result() {
            last_result = Some(event);
        }
    }

    match (&mut producer.0).await {
        Ok(Ok(())) => Ok(last_result),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(join_error(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InputChannel, OutputChannel};
    use async_trait::async_trait;
    use duplex_types::{ErrorCode, ToolMeta, ToolSchema};
    use serde_json::json;

    struct Counter {
        steps: u8,
        fail_after: Option<u8>,
    }

    #[async_trait]
    impl Tool for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn meta(&self) -> ToolMeta {
            ToolMeta::new("Count steps")
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema::new("counter", "Count steps")
        }

        fn mode(&self) -> crate::traits::ExecMode {
            crate::traits::ExecMode::Streaming
        }

        async fn produce(
            &self,
            _params: ToolParams,
            events: EventSink,
            _ctx: &ToolContext,
        ) -> Result<(), ToolError> {
            for i in 0..self.steps {
                if self.fail_after == Some(i) {
                    return Err(ToolError::new(ErrorCode::Dependency, "backend went away"));
                }
                events.progress(format!("step {}", i + 1), None).await?;
            }
            events.success(json!({"steps": self.steps})).await
        }
    }

    fn ctx() -> (ToolContext, crate::context::BufferHandle) {
        let (out, handle) = OutputChannel::buffer();
        let (errs, _) = OutputChannel::buffer();
        (ToolContext::new(out, errs, InputChannel::scripted("")), handle)
    }

    #[tokio::test]
    async fn emits_each_event_as_a_line_and_returns_the_result() {
        let (ctx, out) = ctx();
        let tool = Arc::new(Counter {
            steps: 3,
            fail_after: None,
        });

        let result = run_streaming(tool, ToolParams::empty(), &ctx).await.unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 4);
        let last: serde_json::Value = serde_json::from_str(&lines[3]).unwrap();
        assert_eq!(last["type"], "result");
        assert_eq!(last["status"], "success");
        assert!(matches!(result, Some(StreamEvent::Result { .. })));
    }

    #[tokio::test]
    async fn returns_none_without_a_result_event() {
        struct NoResult;

        #[async_trait]
        impl Tool for NoResult {
            fn name(&self) -> &str {
                "noresult"
            }
            fn meta(&self) -> ToolMeta {
                ToolMeta::default()
            }
            fn schema(&self) -> ToolSchema {
                ToolSchema::new("noresult", "")
            }
            async fn produce(
                &self,
                _params: ToolParams,
                events: EventSink,
                _ctx: &ToolContext,
            ) -> Result<(), ToolError> {
                events.log("info", "only a log line").await
            }
        }

        let (ctx, out) = ctx();
        let result = run_streaming(Arc::new(NoResult), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(out.lines().len(), 1);
    }

    #[tokio::test]
    async fn producer_errors_propagate_after_emitted_events() {
        let (ctx, out) = ctx();
        let tool = Arc::new(Counter {
            steps: 3,
            fail_after: Some(2),
        });

        let err = run_streaming(tool, ToolParams::empty(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Dependency);
        // The two events emitted before the failure are already on the wire.
        assert_eq!(out.lines().len(), 2);
    }

    #[tokio::test]
    async fn last_result_event_wins() {
        struct TwoResults;

        #[async_trait]
        impl Tool for TwoResults {
            fn name(&self) -> &str {
                "tworesults"
            }
            fn meta(&self) -> ToolMeta {
                ToolMeta::default()
            }
            fn schema(&self) -> ToolSchema {
                ToolSchema::new("tworesults", "")
            }
            async fn produce(
                &self,
                _params: ToolParams,
                events: EventSink,
                _ctx: &ToolContext,
            ) -> Result<(), ToolError> {
                events.success(json!({"n": 1})).await?;
                events.success(json!({"n": 2})).await
            }
        }

        let (ctx, _out) = ctx();
        let result = run_streaming(Arc::new(TwoResults), ToolParams::empty(), &ctx)
            .await
            .unwrap();
        let Some(StreamEvent::Result { response }) = result else {
            panic!("expected a result event");
        };
        assert_eq!(response.result, Some(json!({"n": 2})));
    }
}
