//! Sampling channel: synchronous completion requests to the invoking agent.
//!
//! One round trip per call, no retries, blocking the invocation. Two
//! transports: stdin-correlated (request on the primary channel, response
//! matched by correlation id on the input channel) and an HTTP callback.
//! The transport is configured per invocation via `--sample-via` and
//! threaded through the tool context — there is no process-wide state.

use serde::Serialize;
use serde_json::Value;

use duplex_types::ToolError;

use crate::context::ToolContext;

/// Sampling transport target.
///
/// The target string is kept verbatim: `"stdin"` selects the stdin
/// transport, anything starting with `http` is treated as a callback URL,
/// and anything else fails at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    target: String,
}

impl SamplingConfig {
    /// The default stdin-correlated transport.
    pub fn stdin() -> Self {
        Self {
            target: "stdin".to_string(),
        }
    }

    /// Transport from a `--sample-via` target string.
    pub fn via(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The raw target string.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::stdin()
    }
}

/// A completion request.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRequest {
    pub prompt: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl SampleRequest {
    /// Request with the default token budget of 1000.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1000,
            system: None,
            temperature: None,
            stop_sequences: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    /// The wire object: the request fields plus `type` and correlation `id`.
    fn to_wire(&self, id: &str) -> Value {
        let mut wire = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = wire.as_object_mut() {
            obj.insert("type".into(), Value::String("sample_request".into()));
            obj.insert("id".into(), Value::String(id.to_string()));
        }
        wire
    }
}

/// Issue a sampling request over the context's configured transport.
pub(crate) async fn sample(ctx: &ToolContext, request: SampleRequest) -> Result<String, ToolError> {
    let id = format!("{:08x}", rand::random::<u32>());
    sample_with_id(ctx, request, &id).await
}

pub(crate) async fn sample_with_id(
    ctx: &ToolContext,
    request: SampleRequest,
    id: &str,
) -> Result<String, ToolError> {
    let target = ctx.sampling().target().to_string();
    let wire = request.to_wire(id);

    if target == "stdin" {
        sample_via_stdin(ctx, &wire, id).await
    } else if target.starts_with("http") {
        sample_via_http(&wire, &target).await
    } else {
        Err(ToolError::internal(format!(
            "Unknown sample transport: {target}"
        )))
    }
}

/// Emit the request on the primary channel, then scan input lines for the
/// matching response. Non-JSON and non-matching lines are skipped so the
/// exchange can interleave with session or streaming traffic.
async fn sample_via_stdin(ctx: &ToolContext, wire: &Value, id: &str) -> Result<String, ToolError> {
    ctx.out()
        .write_json(wire)
        .map_err(|e| ToolError::internal(format!("primary channel write failed: {e}")))?;

    loop {
        let line = ctx
            .input()
            .read_line()
            .await
            .map_err(|e| ToolError::internal(format!("input channel read failed: {e}")))?
            .ok_or_else(|| {
                ToolError::internal("input channel closed while waiting for sample response")
            })?;

        let Ok(response) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if response.get("type").and_then(Value::as_str) == Some("sample_response")
            && response.get("id").and_then(Value::as_str) == Some(id)
        {
            let content = response
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            return Ok(content);
        }
    }
}

/// POST the request to the callback URL and return the body's `content`.
async fn sample_via_http(wire: &Value, url: &str) -> Result<String, ToolError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| ToolError::internal(format!("sample transport unavailable: {e}")))?;
    let response = client
        .post(url)
        .json(wire)
        .send()
        .await
        .map_err(|e| ToolError::internal(format!("sample callback failed: {e}")))?;
    let body: Value = response
        .json()
        .await
        .map_err(|e| ToolError::internal(format!("sample callback returned invalid JSON: {e}")))?;
    Ok(body
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InputChannel, OutputChannel, ToolContext};
    use duplex_types::ErrorCode;
    use serde_json::json;

    fn ctx(script: &str) -> (ToolContext, crate::context::BufferHandle) {
        let (out, handle) = OutputChannel::buffer();
        let (errs, _) = OutputChannel::buffer();
        (
            ToolContext::new(out, errs, InputChannel::scripted(script)),
            handle,
        )
    }

    #[test]
    fn wire_shape_carries_type_and_id() {
        let wire = SampleRequest::new("Summarize this")
            .max_tokens(64)
            .system("Be terse")
            .to_wire("abcd1234");
        assert_eq!(wire["type"], "sample_request");
        assert_eq!(wire["id"], "abcd1234");
        assert_eq!(wire["prompt"], "Summarize this");
        assert_eq!(wire["max_tokens"], 64);
        assert_eq!(wire["system"], "Be terse");
        assert!(wire.get("temperature").is_none());
    }

    #[tokio::test]
    async fn stdin_transport_matches_on_id_and_skips_noise() {
        let script = concat!(
            "this line is not json\n",
            "{\"type\": \"sample_response\", \"id\": \"other\", \"content\": \"wrong\"}\n",
            "{\"type\": \"notification\", \"kind\": \"log\"}\n",
            "{\"type\": \"sample_response\", \"id\": \"feed0042\", \"content\": \"the answer\"}\n",
        );
        let (ctx, out) = ctx(script);

        let content = sample_with_id(&ctx, SampleRequest::new("question"), "feed0042")
            .await
            .unwrap();
        assert_eq!(content, "the answer");

        // The request itself went out on the primary channel.
        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        let request: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(request["type"], "sample_request");
        assert_eq!(request["id"], "feed0042");
    }

    #[tokio::test]
    async fn stdin_transport_fails_on_eof() {
        let (ctx, _out) = ctx("{\"type\": \"sample_response\", \"id\": \"nope\"}\n");
        let err = sample_with_id(&ctx, SampleRequest::new("question"), "feed0042")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(!err.recoverable);
    }

    #[tokio::test]
    async fn unknown_transport_fails() {
        let (mut base, _out) = ctx("");
        base.set_sampling(SamplingConfig::via("carrier-pigeon"));
        let err = base
            .sample(SampleRequest::new("question"))
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown sample transport"));
    }

    #[tokio::test]
    async fn missing_content_defaults_to_empty() {
        let script = "{\"type\": \"sample_response\", \"id\": \"feed0042\"}\n";
        let (ctx, _out) = ctx(script);
        let content = sample_with_id(&ctx, SampleRequest::new("question"), "feed0042")
            .await
            .unwrap();
        assert_eq!(content, "");
    }

    #[test]
    fn default_transport_is_stdin() {
        assert_eq!(SamplingConfig::default(), SamplingConfig::stdin());
        assert_eq!(json!(SamplingConfig::default().target()), json!("stdin"));
    }
}
