//! Demo tools, resources, and prompts.
//!
//! One of each shape the dispatcher knows: direct calls with and without an
//! input model, reserved fields, streaming, a session, sampling, and
//! notifications.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use duplex_core::{
    EventSink, ExecMode, InputSpec, ModelSpec, ParamSchema, Prompt, Resource, SampleRequest,
    SessionEvent, SessionPeer, Tool, ToolContext, ToolError, ToolInput, ToolMeta, ToolParams,
    ToolSchema,
};

// ---------------------------------------------------------------------------
// add — typed input model
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct AddInput {
    /// First addend.
    pub a: i64,
    /// Second addend.
    pub b: i64,
}

impl ToolInput for AddInput {}

pub struct Add;

#[async_trait]
impl Tool for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Add two numbers")
            .description("Add two numbers and return the sum.")
            .example("Add five and three", r#"duplex-demo add '{"a": 5, "b": 3}'"#)
            .tag("math")
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("add", "Add two numbers")
            .param(ParamSchema::required("a", "integer", "First addend"))
            .param(ParamSchema::required("b", "integer", "Second addend"))
    }

    fn input_model(&self) -> Option<Arc<dyn InputSpec>> {
        Some(Arc::new(ModelSpec::<AddInput>::new()))
    }

    async fn call(&self, params: ToolParams, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let input: &AddInput = params
            .model()
            .ok_or_else(|| ToolError::internal("input model not bound"))?;
        Ok(json!({"sum": input.a + input.b}))
    }
}

// ---------------------------------------------------------------------------
// divide — raw parameters, structured failure
// ---------------------------------------------------------------------------

pub struct Divide;

#[async_trait]
impl Tool for Divide {
    fn name(&self) -> &str {
        "divide"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Divide two numbers").tag("math")
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("divide", "Divide two numbers")
            .param(ParamSchema::required("a", "number", "Dividend"))
            .param(ParamSchema::required("b", "number", "Divisor"))
    }

    async fn call(&self, params: ToolParams, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let map = params
            .raw()
            .ok_or_else(|| ToolError::internal("expected raw params"))?;
        let a = number(map, "a")?;
        let b = number(map, "b")?;
        if b == 0.0 {
            return Err(ToolError::invalid_input("Cannot divide by zero")
                .with_suggestion("Use a non-zero divisor"));
        }
        Ok(json!({"quotient": a / b}))
    }
}

fn number(map: &Map<String, Value>, key: &str) -> Result<f64, ToolError> {
    map.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid_input(format!("{key} must be a number")))
}

// ---------------------------------------------------------------------------
// deploy — reserved fields and redaction
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, JsonSchema)]
pub struct DeployInput {
    /// Service to deploy.
    pub service: String,
    /// Deploy credential; never echoed back.
    #[serde(default)]
    pub token: Option<String>,
    /// Directory to run the deployment from.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Deadline in seconds.
    #[serde(default)]
    pub timeout: Option<i64>,
    /// Report the plan instead of deploying.
    #[serde(default)]
    pub dry_run: bool,
}

impl ToolInput for DeployInput {
    fn pre_validate(&self) -> Result<(), ToolError> {
        if self.service.is_empty() {
            return Err(ToolError::invalid_input("service must not be empty"));
        }
        Ok(())
    }

    fn working_dir(&self) -> Option<PathBuf> {
        self.working_dir.clone()
    }

    fn timeout(&self) -> Option<i64> {
        self.timeout
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn log_safe(&self) -> Option<Value> {
        Some(json!({
            "service": self.service,
            "token": self.token.as_ref().map(|_| "***"),
            "working_dir": self.working_dir,
        }))
    }
}

pub struct Deploy;

#[async_trait]
impl Tool for Deploy {
    fn name(&self) -> &str {
        "deploy"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Deploy a service")
            .description(
                "Pretends to deploy the named service from the current directory. \
                 Honors working_dir, timeout, and dry_run.",
            )
            .example(
                "See what would run",
                r#"duplex-demo deploy '{"service": "api", "dry_run": true}'"#,
            )
            .tag("ops")
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("deploy", "Deploy a service")
    }

    fn input_model(&self) -> Option<Arc<dyn InputSpec>> {
        Some(Arc::new(ModelSpec::<DeployInput>::new()))
    }

    async fn call(&self, params: ToolParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let input: &DeployInput = params
            .model()
            .ok_or_else(|| ToolError::internal("input model not bound"))?;
        let cwd = std::env::current_dir().map_err(|e| ToolError::internal(e.to_string()))?;
        ctx.notify()
            .log("info", format!("deploying {}", input.service));
        Ok(json!({"deployed": input.service, "from": cwd}))
    }
}

// ---------------------------------------------------------------------------
// summarize — sampling
// ---------------------------------------------------------------------------

pub struct Summarize;

#[async_trait]
impl Tool for Summarize {
    fn name(&self) -> &str {
        "summarize"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Summarize text via the invoking agent").example(
            "Summarize over stdin sampling",
            r#"duplex-demo summarize --sample-via stdin --text "long text here""#,
        )
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("summarize", "Summarize text via the invoking agent")
            .param(ParamSchema::required("text", "string", "Text to summarize"))
            .param(ParamSchema::optional(
                "max_words",
                "integer",
                json!(50),
                "Word budget for the summary",
            ))
    }

    async fn call(&self, params: ToolParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let map = params
            .raw()
            .ok_or_else(|| ToolError::internal("expected raw params"))?;
        let text = map
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_input("text is required"))?;
        let max_words = map.get("max_words").and_then(Value::as_u64).unwrap_or(50);

        let summary = ctx
            .sample(
                SampleRequest::new(format!(
                    "Summarize the following in at most {max_words} words:\n\n{text}"
                ))
                .max_tokens(200),
            )
            .await?;
        Ok(json!({"summary": summary}))
    }
}

// ---------------------------------------------------------------------------
// process — streaming with notifications
// ---------------------------------------------------------------------------

pub struct Process;

#[async_trait]
impl Tool for Process {
    fn name(&self) -> &str {
        "process"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Process items, streaming progress").example(
            "Stream five items",
            "duplex-demo process --stream --items 5",
        )
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("process", "Process items, streaming progress").param(
            ParamSchema::optional("items", "integer", json!(3), "Number of items to process"),
        )
    }

    fn mode(&self) -> ExecMode {
        ExecMode::Streaming
    }

    async fn produce(
        &self,
        params: ToolParams,
        events: EventSink,
        ctx: &ToolContext,
    ) -> Result<(), ToolError> {
        let items = params
            .raw()
            .and_then(|m| m.get("items"))
            .and_then(Value::as_u64)
            .unwrap_or(3);

        ctx.notify().log("info", "processing started");
        for i in 1..=items {
            let percent = (i * 100 / items.max(1)) as u8;
            events
                .progress(format!("Processing item {i}/{items}"), Some(percent))
                .await?;
        }
        events.artifact("report.json", "/tmp/report.json").await?;
        events
            .success(json!({"processed": items, "completed": true}))
            .await
    }
}

// ---------------------------------------------------------------------------
// chat — session
// ---------------------------------------------------------------------------

pub struct Chat;

#[async_trait]
impl Tool for Chat {
    fn name(&self) -> &str {
        "chat"
    }

    fn meta(&self) -> ToolMeta {
        ToolMeta::new("Interactive echo conversation").example(
            "Start a session",
            "duplex-demo chat --session",
        )
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("chat", "Interactive echo conversation")
    }

    fn mode(&self) -> ExecMode {
        ExecMode::Session
    }

    async fn converse(
        &self,
        _params: ToolParams,
        mut peer: SessionPeer,
        _ctx: &ToolContext,
    ) -> Result<(), ToolError> {
        let mut turns = 0u64;
        let mut input = peer
            .exchange(SessionEvent::start("Chat started. Send {\"text\": ...} lines."))
            .await?;
        loop {
            if input.get("action").and_then(Value::as_str) == Some("quit") {
                peer.emit(SessionEvent::end("success")).await?;
                return Ok(());
            }
            turns += 1;
            let text = input.get("text").and_then(Value::as_str).unwrap_or("");
            input = peer
                .exchange(SessionEvent::other(json!({
                    "type": "reply",
                    "turn": turns,
                    "echo": text,
                })))
                .await?;
        }
    }
}

// ---------------------------------------------------------------------------
// Resources and prompts
// ---------------------------------------------------------------------------

/// Static configuration exposed as `config://{section}/{key}`.
pub struct ConfigResource;

#[async_trait]
impl Resource for ConfigResource {
    fn uri_pattern(&self) -> &str {
        "config://{section}/{key}"
    }

    fn summary(&self) -> &str {
        "Configuration values by section and key"
    }

    fn mime_types(&self) -> Vec<String> {
        vec!["application/json".into()]
    }

    fn tags(&self) -> Vec<String> {
        vec!["config".into()]
    }

    async fn fetch(
        &self,
        params: HashMap<String, String>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let section = params.get("section").map(String::as_str).unwrap_or("");
        let key = params.get("key").map(String::as_str).unwrap_or("");
        match (section, key) {
            ("server", "port") => Ok(json!({"section": section, "key": key, "value": 8080})),
            ("server", "host") => {
                Ok(json!({"section": section, "key": key, "value": "localhost"}))
            }
            _ => Err(ToolError::not_found(format!(
                "no config entry {section}/{key}"
            ))),
        }
    }
}

/// File metadata exposed as `/files/{id}.json`.
pub struct FileResource;

#[async_trait]
impl Resource for FileResource {
    fn uri_pattern(&self) -> &str {
        "/files/{id}.json"
    }

    fn summary(&self) -> &str {
        "File metadata by id"
    }

    fn mime_types(&self) -> Vec<String> {
        vec!["application/json".into()]
    }

    async fn fetch(
        &self,
        params: HashMap<String, String>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let id = params.get("id").map(String::as_str).unwrap_or("");
        Ok(json!({"id": id, "size": 1024, "mime": "application/json"}))
    }
}

pub struct GreetPrompt;

#[async_trait]
impl Prompt for GreetPrompt {
    fn name(&self) -> &str {
        "greet"
    }

    fn summary(&self) -> &str {
        "Greeting template"
    }

    fn arguments(&self) -> Vec<(String, String)> {
        vec![
            ("name".into(), "Name to greet".into()),
            ("style".into(), "formal or casual".into()),
        ]
    }

    async fn render(
        &self,
        args: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let name = args.get("name").and_then(Value::as_str).unwrap_or("world");
        let style = args.get("style").and_then(Value::as_str).unwrap_or("casual");
        let text = match style {
            "formal" => format!("Good day, {name}."),
            _ => format!("Hey {name}!"),
        };
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_core::{InputChannel, OutputChannel};

    fn ctx() -> ToolContext {
        let (out, _) = OutputChannel::buffer();
        let (errs, _) = OutputChannel::buffer();
        ToolContext::new(out, errs, InputChannel::scripted(""))
    }

    fn raw(pairs: &[(&str, Value)]) -> ToolParams {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), v.clone());
        }
        ToolParams::Raw(map)
    }

    #[tokio::test]
    async fn add_sums() {
        let spec = ModelSpec::<AddInput>::new();
        let bound = spec.bind(json!({"a": 5, "b": 3})).unwrap();
        let result = Add
            .call(ToolParams::Model(bound), &ctx())
            .await
            .unwrap();
        assert_eq!(result, json!({"sum": 8}));
    }

    #[tokio::test]
    async fn divide_rejects_zero_divisor() {
        let err = Divide
            .call(raw(&[("a", json!(10)), ("b", json!(0))]), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.message, "Cannot divide by zero");
        assert_eq!(err.suggestion.as_deref(), Some("Use a non-zero divisor"));
        assert!(err.recoverable);
    }

    #[tokio::test]
    async fn divide_divides() {
        let result = Divide
            .call(raw(&[("a", json!(10)), ("b", json!(4))]), &ctx())
            .await
            .unwrap();
        assert_eq!(result, json!({"quotient": 2.5}));
    }

    #[tokio::test]
    async fn config_resource_knows_its_keys() {
        let mut params = HashMap::new();
        params.insert("section".to_string(), "server".to_string());
        params.insert("key".to_string(), "port".to_string());
        let value = ConfigResource.fetch(params, &ctx()).await.unwrap();
        assert_eq!(value["value"], 8080);

        let mut params = HashMap::new();
        params.insert("section".to_string(), "nope".to_string());
        params.insert("key".to_string(), "nope".to_string());
        let err = ConfigResource.fetch(params, &ctx()).await.unwrap_err();
        assert!(err.recoverable);
    }

    #[tokio::test]
    async fn greet_prompt_renders_styles() {
        let mut args = Map::new();
        args.insert("name".to_string(), json!("Ada"));
        args.insert("style".to_string(), json!("formal"));
        let rendered = GreetPrompt.render(args, &ctx()).await.unwrap();
        assert_eq!(rendered, json!("Good day, Ada."));
    }

    #[test]
    fn deploy_redacts_its_token() {
        let input = DeployInput {
            service: "api".into(),
            token: Some("hunter2".into()),
            working_dir: None,
            timeout: None,
            dry_run: true,
        };
        let safe = input.log_safe().unwrap();
        assert_eq!(safe["token"], "***");
    }
}
