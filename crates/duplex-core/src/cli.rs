//! The command dispatcher — the single execution path for every invocation.
//!
//! Maps raw process arguments to exactly one of: global introspection,
//! resource fetch, prompt render, or tool execution. Argument parsing is
//! hand-rolled: the surface is small and the JSON-or-flags duality does not
//! fit a flag library.
//!
//! ```text
//! argv ──▶ global flags (--help/--discover/--tools/--resources/--prompts)
//!      ──▶ --resource <uri> ──▶ router ──▶ handler ──▶ raw JSON
//!      ──▶ --prompt <name> <json> ──▶ prompt ──▶ raw JSON
//!      ──▶ <command> [args]
//!             ├─ --manifest / --help / --validate  (no execution)
//!             └─ parse params ──▶ bind model ──▶ reserved fields
//!                    ──▶ Direct    ──▶ envelope on stdout
//!                    ──▶ Streaming ──▶ event lines on stdout   (--stream)
//!                    ──▶ Session   ──▶ alternating exchange    (--session)
//! ```
//!
//! Failure is data: every structured error renders as an envelope on the
//! primary channel and the process continues; only I/O failures on the
//! channels themselves escape as hard errors.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use duplex_types::{ErrorCode, Response, ToolError, ToolParams};

use crate::context::{OutputChannel, ToolContext};
use crate::manifest;
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use crate::router::{capture_params, compile_pattern};
use crate::sample::SamplingConfig;
use crate::session::run_session;
use crate::stream::run_streaming;
use crate::task::{join_error, AbortOnDrop};
use crate::traits::{ExecMode, Prompt, Resource, Tool};

/// Flags that never become tool parameters.
const DISPATCH_FLAGS: &[&str] = &[
    "--stream",
    "--session",
    "--sample-via",
    "--manifest",
    "--help",
    "--validate",
];

fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn position(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
}

/// A dual-protocol command-line application.
///
/// Register tools, resources, and prompts, then hand control to [`run`].
/// The same registration serves both dialects: flags with human text, or
/// JSON envelopes for agent callers.
///
/// [`run`]: AgentCli::run
pub struct AgentCli {
    name: String,
    version: String,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
}

impl AgentCli {
    /// Create an application with no registrations.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
        }
    }

    /// Register a tool.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Register a resource.
    pub fn resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.register(resource);
        self
    }

    /// Register a prompt.
    pub fn prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompts.register(prompt);
        self
    }

    /// The registered tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Execute against the real process arguments and streams.
    pub async fn run(&self) -> io::Result<()> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut ctx = ToolContext::stdio();
        self.run_with(&args, &mut ctx).await
    }

    /// Execute against explicit arguments and channels.
    pub async fn run_with(&self, args: &[String], ctx: &mut ToolContext) -> io::Result<()> {
        let out = ctx.out().clone();

        if args.is_empty() || (args.len() == 1 && args[0] == "--help") {
            return self.print_help(&out);
        }

        // Global introspection takes precedence over tool dispatch.
        if has(args, "--discover") {
            return out.write_pretty(&manifest::discover(
                &self.name,
                &self.version,
                &self.tools,
                &self.resources,
                &self.prompts,
            ));
        }
        if has(args, "--tools") {
            return out.write_pretty(&manifest::tools_listing(&self.tools));
        }
        if has(args, "--resources") {
            return out.write_pretty(&manifest::resources_listing(&self.resources));
        }
        if has(args, "--prompts") {
            return out.write_pretty(&manifest::prompts_listing(&self.prompts));
        }

        if let Some(i) = position(args, "--resource") {
            if i + 1 < args.len() {
                self.fetch_resource(&args[i + 1], ctx).await?;
            }
            return Ok(());
        }
        if let Some(i) = position(args, "--prompt") {
            if i + 2 < args.len() {
                self.render_prompt(&args[i + 1], &args[i + 2], ctx).await?;
            }
            return Ok(());
        }

        let command = &args[0];
        let (tool, tool_args): (Arc<dyn Tool>, &[String]) = match self.tools.get(command) {
            Some(tool) => (Arc::clone(tool), &args[1..]),
            // Single-tool shorthand: every token belongs to the only tool.
            None => match self.tools.sole() {
                Some(tool) => (Arc::clone(tool), args),
                None => {
                    let err = ToolError::not_found(format!("Unknown command: {command}"));
                    return out.write_json(&err.to_response());
                }
            },
        };
        self.run_tool(&tool, tool_args, ctx).await
    }

    async fn run_tool(
        &self,
        tool: &Arc<dyn Tool>,
        args: &[String],
        ctx: &mut ToolContext,
    ) -> io::Result<()> {
        let out = ctx.out().clone();

        if has(args, "--manifest") {
            return out.write_pretty(&manifest::tool_manifest(tool.as_ref()));
        }
        if has(args, "--help") {
            return self.print_tool_help(tool.as_ref(), &out);
        }

        let stream_flag = has(args, "--stream");
        let session_flag = has(args, "--session");

        if let Some(i) = position(args, "--sample-via") {
            if i + 1 < args.len() {
                ctx.set_sampling(SamplingConfig::via(&args[i + 1]));
            }
        }

        // A bare JSON-object token is whole-input JSON.
        let mut json_input: Option<&str> = args
            .iter()
            .find(|a| a.starts_with('{'))
            .map(String::as_str);

        if let Some(i) = position(args, "--validate") {
            if i + 1 < args.len() {
                json_input = Some(&args[i + 1]);
            }
            let report = self.validate_input(tool.as_ref(), json_input.unwrap_or("{}"));
            return out.write_json(&report);
        }

        let params = match self.parse_input(tool.as_ref(), args, json_input) {
            Ok(params) => params,
            Err(err) => return out.write_json(&err.to_response()),
        };

        // Reserved fields apply to bound input models only.
        let mut deadline = None;
        if let Some(input) = params.bound() {
            if let Err(err) = input.pre_validate() {
                return out.write_json(&err.to_response());
            }

            if let Some(dir) = input.working_dir() {
                if !dir.is_dir() {
                    let err = ToolError::new(
                        ErrorCode::InvalidPath,
                        format!("Directory not found: {}", dir.display()),
                    );
                    return out.write_json(&err.to_response());
                }
                // The prior working directory is not restored afterwards.
                if let Err(io_err) = std::env::set_current_dir(&dir) {
                    let err = ToolError::new(
                        ErrorCode::InvalidPath,
                        format!("Cannot enter directory {}: {io_err}", dir.display()),
                    );
                    return out.write_json(&err.to_response());
                }
            }

            if let Some(timeout) = input.timeout() {
                if timeout <= 0 {
                    let err = ToolError::invalid_input("timeout must be positive");
                    return out.write_json(&err.to_response());
                }
                if timeout > 600 {
                    let err = ToolError::invalid_input("timeout exceeds maximum (600 seconds)");
                    return out.write_json(&err.to_response());
                }
                deadline = Some(Duration::from_secs(timeout as u64));
            }

            if input.dry_run() {
                let response = Response::success(json!({
                    "dry_run": true,
                    "would_execute": input.log_safe(),
                }));
                return out.write_json(&response);
            }
        }

        let execution = self.execute(tool, params, stream_flag, session_flag, ctx);
        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(outcome) => outcome,
                // Dropping the execution future aborts the tool task.
                Err(_) => Err(ToolError::new(ErrorCode::Timeout, "Operation timed out")),
            },
            None => execution.await,
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => out.write_json(&err.to_response()),
        }
    }

    /// Mode resolution: route the invocation through the declared driver.
    ///
    /// The flag guards run before any tool code, so a declared-streaming or
    /// declared-session tool never executes as a direct call by accident.
    async fn execute(
        &self,
        tool: &Arc<dyn Tool>,
        params: ToolParams,
        stream_flag: bool,
        session_flag: bool,
        ctx: &ToolContext,
    ) -> Result<(), ToolError> {
        let write = |value: &Value| {
            ctx.out()
                .write_json(value)
                .map_err(|e| ToolError::internal(format!("primary channel write failed: {e}")))
        };

        match tool.mode() {
            ExecMode::Streaming => {
                if !stream_flag {
                    return Err(ToolError::invalid_input("This tool requires --stream flag")
                        .with_suggestion("Add --stream to the command"));
                }
                // The driver owns all primary output from here on.
                run_streaming(Arc::clone(tool), params, ctx).await?;
                Ok(())
            }
            ExecMode::Session => {
                if !session_flag {
                    return Err(ToolError::invalid_input("This tool requires --session flag")
                        .with_suggestion("Add --session to the command"));
                }
                let status = run_session(Arc::clone(tool), params, ctx).await?;
                write(&status.to_value())
            }
            ExecMode::Direct => {
                let value = self.call_direct(tool, params, ctx).await?;
                let rendered = match value {
                    // The tool built its own envelope; do not double-wrap.
                    Value::Object(map) if map.contains_key("status") => Value::Object(map),
                    Value::Object(map) => Response::success(Value::Object(map)).to_value(),
                    other => Response::success(json!({"result": other})).to_value(),
                };
                write(&rendered)
            }
        }
    }

    /// Invoke a direct tool on its own task so a panic becomes a structured
    /// `INTERNAL` error instead of a process abort.
    async fn call_direct(
        &self,
        tool: &Arc<dyn Tool>,
        params: ToolParams,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let mut task = AbortOnDrop({
            let tool = Arc::clone(tool);
            let ctx = ctx.clone();
            tokio::spawn(async move { tool.call(params, &ctx).await })
        });
        match (&mut task.0).await {
            Ok(result) => result,
            Err(err) => Err(join_error(err)),
        }
    }

    /// Build tool parameters from whole-input JSON or `--key value` flags.
    fn parse_input(
        &self,
        tool: &dyn Tool,
        args: &[String],
        json_input: Option<&str>,
    ) -> Result<ToolParams, ToolError> {
        if let Some(text) = json_input {
            let data: Value = serde_json::from_str(text)
                .map_err(|e| ToolError::invalid_input(format!("Invalid JSON: {e}")))?;
            if let Some(spec) = tool.input_model() {
                return Ok(ToolParams::Model(spec.bind(data)?));
            }
            let Value::Object(map) = data else {
                return Err(ToolError::invalid_input("Input must be a JSON object"));
            };
            return Ok(ToolParams::Raw(map));
        }

        let mut map = Map::new();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg.starts_with("--") && !DISPATCH_FLAGS.contains(&arg.as_str()) {
                let key = arg[2..].replace('-', "_");
                if i + 1 < args.len() && !args[i + 1].starts_with("--") {
                    let raw = &args[i + 1];
                    // Scalars and containers parse as JSON; anything else is
                    // the literal string. Duplicates: last occurrence wins.
                    let value = serde_json::from_str::<Value>(raw)
                        .unwrap_or_else(|_| Value::String(raw.clone()));
                    map.insert(key, value);
                    i += 2;
                } else {
                    map.insert(key, Value::Bool(true));
                    i += 1;
                }
            } else {
                i += 1;
            }
        }

        if let Some(spec) = tool.input_model() {
            return Ok(ToolParams::Model(spec.bind(Value::Object(map))?));
        }
        Ok(ToolParams::Raw(map))
    }

    /// Validate without executing: parse, bind, `pre_validate`, report.
    fn validate_input(&self, tool: &dyn Tool, json_text: &str) -> Value {
        let data: Value = match serde_json::from_str(json_text) {
            Ok(data) => data,
            Err(e) => {
                return json!({"valid": false, "errors": [{"message": e.to_string()}]});
            }
        };

        let Some(spec) = tool.input_model() else {
            return json!({"valid": true});
        };

        let bound = match spec.bind(data) {
            Ok(bound) => bound,
            Err(e) => {
                return json!({
                    "valid": false,
                    "errors": [{"code": e.code.as_str(), "message": e.message}],
                });
            }
        };

        match bound.pre_validate() {
            Ok(()) => json!({"valid": true}),
            Err(e) => json!({
                "valid": false,
                "errors": [{"code": e.code.as_str(), "message": e.message}],
            }),
        }
    }

    async fn fetch_resource(&self, uri: &str, ctx: &ToolContext) -> io::Result<()> {
        let out = ctx.out().clone();

        for resource in self.resources.iter() {
            let regex = match compile_pattern(resource.uri_pattern()) {
                Ok(regex) => regex,
                Err(err) => {
                    tracing::warn!(
                        pattern = resource.uri_pattern(),
                        error = %err.message,
                        "skipping unroutable resource pattern"
                    );
                    continue;
                }
            };
            let Some(params) = capture_params(&regex, uri) else {
                continue;
            };

            let mut task = AbortOnDrop({
                let resource = Arc::clone(resource);
                let ctx = ctx.clone();
                tokio::spawn(async move { resource.fetch(params, &ctx).await })
            });
            let result = match (&mut task.0).await {
                Ok(result) => result,
                Err(err) => Err(join_error(err)),
            };
            return match result {
                // Resource output is the handler's raw value, not an envelope.
                Ok(value) => out.write_json(&value),
                Err(err) => out.write_json(&ToolError::internal(err.message).to_response()),
            };
        }

        let err = ToolError::not_found(format!("No resource matches URI: {uri}"));
        out.write_json(&err.to_response())
    }

    async fn render_prompt(&self, name: &str, json_args: &str, ctx: &ToolContext) -> io::Result<()> {
        let out = ctx.out().clone();

        let Some(prompt) = self.prompts.get(name) else {
            let err = ToolError::not_found(format!("Unknown prompt: {name}"));
            return out.write_json(&err.to_response());
        };

        let args = match serde_json::from_str::<Value>(json_args) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                let err = ToolError::internal("Prompt arguments must be a JSON object");
                return out.write_json(&err.to_response());
            }
            Err(e) => {
                return out.write_json(&ToolError::internal(e.to_string()).to_response());
            }
        };

        let mut task = AbortOnDrop({
            let prompt = Arc::clone(prompt);
            let ctx = ctx.clone();
            tokio::spawn(async move { prompt.render(args, &ctx).await })
        });
        let result = match (&mut task.0).await {
            Ok(result) => result,
            Err(err) => Err(join_error(err)),
        };
        match result {
            Ok(value) => out.write_json(&value),
            Err(err) => out.write_json(&ToolError::internal(err.message).to_response()),
        }
    }

    fn print_help(&self, out: &OutputChannel) -> io::Result<()> {
        let mut text = format!("{} v{}\n\n", self.name, self.version);
        text.push_str("Usage:\n");
        text.push_str(&format!(
            "  {} --discover              Show all tools, resources, prompts\n",
            self.name
        ));
        text.push_str(&format!(
            "  {} <command> --manifest    Show command schema\n",
            self.name
        ));
        text.push_str(&format!(
            "  {} <command> '{{}}'          Execute with JSON input\n",
            self.name
        ));
        text.push_str(&format!(
            "  {} <command> --flag value  Execute with CLI flags\n",
            self.name
        ));
        text.push_str("\nCommands:\n");
        for tool in self.tools.iter() {
            text.push_str(&format!("  {:<20} {}\n", tool.name(), tool.meta().summary));
        }
        out.write_text(text.trim_end())
    }

    fn print_tool_help(&self, tool: &dyn Tool, out: &OutputChannel) -> io::Result<()> {
        let meta = tool.meta();
        let mut text = format!("{} - {}\n", tool.name(), meta.summary);
        if !meta.description.is_empty() {
            text.push('\n');
            text.push_str(&meta.description);
            text.push('\n');
        }

        let schema = manifest::tool_schema_json(tool);
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            if !props.is_empty() {
                text.push_str("\nParameters:\n");
                for (name, prop) in props {
                    let marker = if required.contains(&name.as_str()) { "*" } else { " " };
                    let param_type = prop.get("type").and_then(Value::as_str).unwrap_or("string");
                    let description = prop
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let default = prop
                        .get("default")
                        .map(|d| format!(" (default: {d})"))
                        .unwrap_or_default();
                    text.push_str(&format!(
                        "  {marker} --{name:<15} {param_type:<10} {description}{default}\n"
                    ));
                }
            }
        }

        out.write_text(text.trim_end())
    }
}
