//! duplex-registry: a client for external duplex executables.
//!
//! Any executable speaking the duplex protocol can be mounted here: it must
//! answer `--discover` with a manifest within the discovery deadline and
//! exit zero, answer `<tool> --manifest` with a schema object, and answer
//! `<tool> <json>`, `--resource <uri>`, and `--prompt <name> <json>` with
//! JSON on stdout. A violation makes that executable unavailable — logged
//! and skipped, never fatal to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;

use duplex_core::{capture_params, compile_pattern};
use duplex_types::{ErrorCode, Response, ToolError};

/// How long a `--discover` probe may take before the executable is treated
/// as unavailable.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from registry lookups that have no envelope to return.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("failed to run {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} produced invalid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A tool advertised by an external executable.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    pub name: String,
    pub summary: String,
    pub streaming: bool,
    pub session_mode: bool,
    pub path: PathBuf,
}

/// A resource advertised by an external executable.
#[derive(Debug, Clone)]
pub struct ExternalResource {
    pub uri_pattern: String,
    pub summary: String,
    pub path: PathBuf,
}

/// A prompt advertised by an external executable.
#[derive(Debug, Clone)]
pub struct ExternalPrompt {
    pub name: String,
    pub summary: String,
    pub path: PathBuf,
}

/// Cached manifests from a set of external executables, with proxied
/// invocation.
#[derive(Debug, Default)]
pub struct ExternalRegistry {
    tools: Vec<ExternalTool>,
    resources: Vec<ExternalResource>,
    prompts: Vec<ExternalPrompt>,
}

impl ExternalRegistry {
    /// Discover every executable in `paths`, caching their manifests.
    ///
    /// Missing files are skipped; discovery timeouts, non-zero exits, and
    /// malformed manifests are warned about and skipped.
    pub async fn load<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut registry = Self::default();
        for path in paths {
            registry.load_executable(path.into()).await;
        }
        registry
    }

    async fn load_executable(&mut self, path: PathBuf) {
        if !path.exists() {
            return;
        }

        let manifest = match discover_manifest(&path).await {
            Ok(manifest) => manifest,
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "failed to load external tool");
                return;
            }
        };

        for tool in manifest.get("tools").and_then(Value::as_array).into_iter().flatten() {
            let Some(name) = tool.get("name").and_then(Value::as_str) else {
                continue;
            };
            let entry = ExternalTool {
                name: name.to_string(),
                summary: string_field(tool, "summary"),
                streaming: tool.get("streaming").and_then(Value::as_bool).unwrap_or(false),
                session_mode: tool
                    .get("session_mode")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                path: path.clone(),
            };
            match self.tools.iter_mut().find(|t| t.name == entry.name) {
                Some(slot) => *slot = entry,
                None => self.tools.push(entry),
            }
        }

        for resource in manifest
            .get("resources")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(pattern) = resource.get("uri_pattern").and_then(Value::as_str) else {
                continue;
            };
            let entry = ExternalResource {
                uri_pattern: pattern.to_string(),
                summary: string_field(resource, "summary"),
                path: path.clone(),
            };
            match self
                .resources
                .iter_mut()
                .find(|r| r.uri_pattern == entry.uri_pattern)
            {
                Some(slot) => *slot = entry,
                None => self.resources.push(entry),
            }
        }

        for prompt in manifest
            .get("prompts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(name) = prompt.get("name").and_then(Value::as_str) else {
                continue;
            };
            let entry = ExternalPrompt {
                name: name.to_string(),
                summary: string_field(prompt, "summary"),
                path: path.clone(),
            };
            match self.prompts.iter_mut().find(|p| p.name == entry.name) {
                Some(slot) => *slot = entry,
                None => self.prompts.push(entry),
            }
        }
    }

    /// Tool summaries, for injecting into an agent's context.
    pub fn discover(&self) -> HashMap<String, String> {
        self.tools
            .iter()
            .map(|t| (t.name.clone(), t.summary.clone()))
            .collect()
    }

    /// The cached tool records.
    pub fn tools(&self) -> &[ExternalTool] {
        &self.tools
    }

    /// The cached resource records.
    pub fn resources(&self) -> &[ExternalResource] {
        &self.resources
    }

    /// The cached prompt records.
    pub fn prompts(&self) -> &[ExternalPrompt] {
        &self.prompts
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }

    /// Fetch the full schema for a tool (`<path> <name> --manifest`).
    pub async fn schema(&self, name: &str) -> Result<Value, RegistryError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        let output = run_executable(&tool.path, &[name, "--manifest"])
            .await
            .map_err(|source| RegistryError::Spawn {
                path: tool.path.clone(),
                source,
            })?;
        serde_json::from_slice(&output.stdout).map_err(|source| RegistryError::InvalidJson {
            path: tool.path.clone(),
            source,
        })
    }

    /// Execute a tool and return its response envelope.
    ///
    /// Failures come back as envelopes too: unknown names as `NOT_FOUND`,
    /// spawn failures and non-JSON stdout as `INTERNAL`.
    pub async fn call(&self, name: &str, params: &Value) -> Value {
        let Some(tool) = self.tools.iter().find(|t| t.name == name) else {
            return error_value(ToolError::not_found(format!("Unknown tool: {name}")));
        };

        let payload = params.to_string();
        proxy(&tool.path, &[name, &payload]).await
    }

    /// Fetch a resource by URI through whichever executable advertised a
    /// matching pattern. First registered pattern wins.
    pub async fn fetch_resource(&self, uri: &str) -> Value {
        for resource in &self.resources {
            let Ok(regex) = compile_pattern(&resource.uri_pattern) else {
                continue;
            };
            if capture_params(&regex, uri).is_some() {
                return proxy(&resource.path, &["--resource", uri]).await;
            }
        }
        error_value(ToolError::not_found(format!("No resource matches: {uri}")))
    }

    /// Render a prompt through the executable that advertised it.
    pub async fn render_prompt(&self, name: &str, args: &Value) -> Value {
        let Some(prompt) = self.prompts.iter().find(|p| p.name == name) else {
            return error_value(ToolError::not_found(format!("Unknown prompt: {name}")));
        };
        let payload = args.to_string();
        proxy(&prompt.path, &["--prompt", name, &payload]).await
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn error_value(err: ToolError) -> Value {
    Response::from_error(&err).to_value()
}

/// Run `<path> --discover` under the discovery deadline and parse the
/// manifest. Returns a human-readable reason on any failure.
async fn discover_manifest(path: &Path) -> Result<Value, String> {
    let output = tokio::time::timeout(
        DISCOVERY_TIMEOUT,
        run_executable(path, &["--discover"]),
    )
    .await
    .map_err(|_| "discovery timed out".to_string())?
    .map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(format!("discovery exited with {}", output.status));
    }
    serde_json::from_slice(&output.stdout).map_err(|e| format!("invalid manifest: {e}"))
}

/// Run an external tool invocation and translate the outcome to a JSON
/// value, exactly as an in-process caller would see it.
async fn proxy(path: &Path, args: &[&str]) -> Value {
    let output = match run_executable(path, args).await {
        Ok(output) => output,
        Err(e) => {
            return error_value(ToolError::new(
                ErrorCode::Internal,
                format!("{}: {e}", path.display()),
            ));
        }
    };
    match serde_json::from_slice(&output.stdout) {
        Ok(value) => value,
        Err(_) => error_value(ToolError::internal(format!(
            "Invalid response: {}",
            String::from_utf8_lossy(&output.stdout)
        ))),
    }
}

async fn run_executable(path: &Path, args: &[&str]) -> std::io::Result<std::process::Output> {
    let mut command = Command::new(path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn()?;
    child.wait_with_output().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_executables_yield_an_empty_registry() {
        let registry = ExternalRegistry::load(["/no/such/tool/anywhere"]).await;
        assert!(registry.is_empty());
        assert!(registry.discover().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_call_returns_not_found_envelope() {
        let registry = ExternalRegistry::default();
        let response = registry.call("ping", &json!({})).await;
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], "NOT_FOUND");
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("ping"));
    }

    #[tokio::test]
    async fn unknown_resource_uri_returns_not_found_envelope() {
        let registry = ExternalRegistry::default();
        let response = registry.fetch_resource("/files/123").await;
        assert_eq!(response["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_prompt_returns_not_found_envelope() {
        let registry = ExternalRegistry::default();
        let response = registry.render_prompt("greet", &json!({})).await;
        assert_eq!(response["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn unknown_tool_schema_is_an_error() {
        let registry = ExternalRegistry::default();
        let err = registry.schema("ping").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTool(name) if name == "ping"));
    }

    #[cfg(unix)]
    mod fixtures {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Write an executable shell script speaking the duplex protocol.
        fn fixture_tool(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fixture-tool");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        const CONFORMING: &str = r#"
if [ "$2" = "--manifest" ]; then
  echo '{"name": "ping", "summary": "Ping", "schema": {"type": "object", "properties": {}}}'
  exit 0
fi
case "$1" in
  --discover)
    echo '{"name": "fixture", "version": "0.0.1", "tools": [{"name": "ping", "summary": "Ping the fixture", "streaming": false, "session_mode": false}], "resources": [{"uri_pattern": "/files/{id}", "summary": "File by id", "mime_types": [], "tags": []}], "prompts": [{"name": "greet", "summary": "Greet", "arguments": {}, "tags": []}]}'
    ;;
  --resource)
    echo '{"id": "123"}'
    ;;
  --prompt)
    echo '"Hello from fixture"'
    ;;
  ping)
    echo '{"status": "success", "result": {"pong": true}}'
    ;;
esac
"#;

        #[tokio::test]
        async fn discovery_caches_the_manifest() {
            let dir = tempfile::tempdir().unwrap();
            let path = fixture_tool(&dir, CONFORMING);
            let registry = ExternalRegistry::load([path]).await;

            assert_eq!(registry.tools().len(), 1);
            assert_eq!(registry.tools()[0].name, "ping");
            assert!(!registry.tools()[0].streaming);
            assert_eq!(registry.resources().len(), 1);
            assert_eq!(registry.prompts().len(), 1);
            assert_eq!(registry.discover()["ping"], "Ping the fixture");
        }

        #[tokio::test]
        async fn call_proxies_the_envelope() {
            let dir = tempfile::tempdir().unwrap();
            let path = fixture_tool(&dir, CONFORMING);
            let registry = ExternalRegistry::load([path]).await;

            let response = registry.call("ping", &json!({"x": 1})).await;
            assert_eq!(response["status"], "success");
            assert_eq!(response["result"]["pong"], true);
        }

        #[tokio::test]
        async fn schema_proxies_the_manifest_call() {
            let dir = tempfile::tempdir().unwrap();
            let path = fixture_tool(&dir, CONFORMING);
            let registry = ExternalRegistry::load([path]).await;

            let schema = registry.schema("ping").await.unwrap();
            assert_eq!(schema["name"], "ping");
            assert_eq!(schema["schema"]["type"], "object");
        }

        #[tokio::test]
        async fn resource_and_prompt_proxying() {
            let dir = tempfile::tempdir().unwrap();
            let path = fixture_tool(&dir, CONFORMING);
            let registry = ExternalRegistry::load([path]).await;

            let resource = registry.fetch_resource("/files/123").await;
            assert_eq!(resource["id"], "123");

            let rendered = registry.render_prompt("greet", &json!({})).await;
            assert_eq!(rendered, json!("Hello from fixture"));
        }

        #[tokio::test]
        async fn malformed_manifest_skips_the_executable() {
            let dir = tempfile::tempdir().unwrap();
            let path = fixture_tool(&dir, "echo 'this is not a manifest'");
            let registry = ExternalRegistry::load([path]).await;
            assert!(registry.is_empty());
        }

        #[tokio::test]
        async fn non_json_tool_output_is_an_invalid_response_error() {
            let dir = tempfile::tempdir().unwrap();
            let body = r#"
case "$1" in
  --discover)
    echo '{"name": "fixture", "version": "0.0.1", "tools": [{"name": "garble", "summary": "", "streaming": false, "session_mode": false}], "resources": [], "prompts": []}'
    ;;
  garble)
    echo 'plain text, not an envelope'
    ;;
esac
"#;
            let path = fixture_tool(&dir, body);
            let registry = ExternalRegistry::load([path]).await;

            let response = registry.call("garble", &json!({})).await;
            assert_eq!(response["status"], "error");
            assert_eq!(response["error"]["code"], "INTERNAL");
            assert!(response["error"]["message"]
                .as_str()
                .unwrap()
                .starts_with("Invalid response:"));
        }
    }
}
